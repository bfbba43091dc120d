// Path: crates/committee/src/reputation.rs

//! Event-driven reputation tracking with append-only history.
//!
//! Deltas: -0.3 for an attestation proven wrong by a challenge, +0.1 for a
//! successful challenge. Inactivity decays reputation by 5% per week.
//! Values clamp to `[0, 1]` and travel with the verifier's signed manifest.

use std::collections::HashMap;
use std::sync::Mutex;
use swarm_types::committee::ReputationEvent;
use tracing::debug;

const DEFAULT_REPUTATION: f64 = 0.8;
const DECAY_PER_WEEK: f64 = 0.95;
const NS_PER_WEEK: u64 = 7 * 86_400 * 1_000_000_000;

#[derive(Debug, Clone)]
pub struct ReputationEntry {
    pub timestamp_ns: u64,
    pub event: ReputationEvent,
    pub reputation_after: f64,
}

struct RepState {
    reputation: f64,
    last_activity_ns: u64,
    history: Vec<ReputationEntry>,
}

#[derive(Default)]
pub struct ReputationTracker {
    state: Mutex<HashMap<String, RepState>>,
}

impl ReputationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a verifier's reputation (e.g. from a portable signed manifest).
    pub fn initialize(&self, verifier_id: &str, reputation: f64, now_ns: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.insert(
                verifier_id.to_string(),
                RepState {
                    reputation: reputation.clamp(0.0, 1.0),
                    last_activity_ns: now_ns,
                    history: Vec::new(),
                },
            );
        }
    }

    /// Apply an event. Pending inactivity decay lands first, then the
    /// event delta, then the clamp.
    pub fn record_event(&self, verifier_id: &str, event: ReputationEvent, now_ns: u64) -> f64 {
        let delta = match event {
            ReputationEvent::FailedAttestation => -0.3,
            ReputationEvent::SuccessfulChallenge => 0.1,
        };
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = state.entry(verifier_id.to_string()).or_insert(RepState {
            reputation: DEFAULT_REPUTATION,
            last_activity_ns: now_ns,
            history: Vec::new(),
        });

        entry.reputation = decayed(entry.reputation, entry.last_activity_ns, now_ns);
        entry.reputation = (entry.reputation + delta).clamp(0.0, 1.0);
        entry.last_activity_ns = now_ns;
        entry.history.push(ReputationEntry {
            timestamp_ns: now_ns,
            event,
            reputation_after: entry.reputation,
        });
        debug!(
            target: "committee",
            verifier = %verifier_id,
            ?event,
            reputation = entry.reputation,
            "reputation updated"
        );
        entry.reputation
    }

    /// Current reputation with pending decay applied (read-only; the
    /// stored value only moves on events).
    pub fn reputation(&self, verifier_id: &str, now_ns: u64) -> f64 {
        self.state
            .lock()
            .ok()
            .and_then(|state| {
                state
                    .get(verifier_id)
                    .map(|e| decayed(e.reputation, e.last_activity_ns, now_ns))
            })
            .unwrap_or(DEFAULT_REPUTATION)
    }

    /// True once the tracker has seen this verifier; callers fall back to
    /// the manifest's portable snapshot otherwise.
    pub fn tracked(&self, verifier_id: &str) -> bool {
        self.state
            .lock()
            .map(|state| state.contains_key(verifier_id))
            .unwrap_or(false)
    }

    pub fn history(&self, verifier_id: &str) -> Vec<ReputationEntry> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.get(verifier_id).map(|e| e.history.clone()))
            .unwrap_or_default()
    }
}

fn decayed(reputation: f64, last_activity_ns: u64, now_ns: u64) -> f64 {
    let weeks = now_ns.saturating_sub(last_activity_ns) / NS_PER_WEEK;
    (reputation * DECAY_PER_WEEK.powi(weeks as i32)).clamp(0.0, 1.0)
}
