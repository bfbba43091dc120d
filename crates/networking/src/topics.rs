// Path: crates/networking/src/topics.rs

//! Topic conventions: `/swarm/thread/<thread_id>/<verb>`, verb lowercased,
//! `*` accepted as a wildcard segment on the subscribe side.

/// A parsed swarm topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmTopic {
    pub thread_id: String,
    pub verb: String,
}

impl SwarmTopic {
    pub fn new(thread_id: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            verb: verb.into(),
        }
    }

    /// Topic string for a thread and verb.
    pub fn format(&self) -> String {
        format!("/swarm/thread/{}/{}", self.thread_id, self.verb)
    }

    /// Parse `/swarm/thread/<thread_id>/<verb>`; anything else is `None`.
    pub fn parse(topic: &str) -> Option<Self> {
        let rest = topic.strip_prefix("/swarm/thread/")?;
        let (thread_id, verb) = rest.split_once('/')?;
        if thread_id.is_empty() || verb.is_empty() || verb.contains('/') {
            return None;
        }
        Some(Self::new(thread_id, verb))
    }
}

/// Wildcard topic covering every verb of a thread.
pub fn wildcard_topic(thread_id: &str) -> String {
    SwarmTopic::new(thread_id, "*").format()
}

/// True if `topic` matches `pattern`, where the pattern's thread and verb
/// segments may each be `*`.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let (pattern, topic) = match (SwarmTopic::parse(pattern), SwarmTopic::parse(topic)) {
        (Some(p), Some(t)) => (p, t),
        // Non-swarm topics only match exactly.
        _ => return pattern == topic,
    };
    (pattern.thread_id == "*" || pattern.thread_id == topic.thread_id)
        && (pattern.verb == "*" || pattern.verb == topic.verb)
}
