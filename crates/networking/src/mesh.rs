// Path: crates/networking/src/mesh.rs

//! In-process gossip mesh.
//!
//! Faithful to the substrate contract: at-least-once, unordered, no
//! duplicate suppression, delivery to every matching subscription
//! including the publisher's own. Multi-host deployments replace this with
//! a real pubsub transport behind the same `Gossip` trait.

use crate::topics::topic_matches;
use crate::traits::{Gossip, GossipMessage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use swarm_types::error::GossipError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const SUBSCRIPTION_DEPTH: usize = 256;

struct Subscription {
    peer: String,
    pattern: String,
    sender: mpsc::Sender<GossipMessage>,
}

#[derive(Default)]
struct MeshState {
    peers: Vec<String>,
    subscriptions: Vec<Subscription>,
}

/// The shared mesh all in-process peers join.
#[derive(Default)]
pub struct GossipMesh {
    state: Mutex<MeshState>,
}

impl GossipMesh {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join the mesh under a peer name; the handle implements `Gossip`.
    pub fn join(self: &Arc<Self>, peer: impl Into<String>) -> MeshHandle {
        let peer = peer.into();
        if let Ok(mut state) = self.state.lock() {
            if !state.peers.contains(&peer) {
                state.peers.push(peer.clone());
            }
        }
        MeshHandle {
            mesh: Arc::clone(self),
            peer,
        }
    }

    async fn deliver(&self, topic: &str, data: &[u8]) -> Result<(), GossipError> {
        let targets: Vec<(String, mpsc::Sender<GossipMessage>)> = {
            let mut state = self.state.lock().map_err(|_| GossipError::Closed)?;
            // Drop subscriptions whose receivers are gone.
            state.subscriptions.retain(|s| !s.sender.is_closed());
            state
                .subscriptions
                .iter()
                .filter(|s| topic_matches(&s.pattern, topic))
                .map(|s| (s.peer.clone(), s.sender.clone()))
                .collect()
        };
        for (peer, sender) in targets {
            let msg = GossipMessage {
                topic: topic.to_string(),
                data: data.to_vec(),
            };
            // Bounded send: a slow consumer delays the publisher, which
            // surfaces to callers as delayed acks.
            if sender.send(msg).await.is_err() {
                warn!(target: "gossip", peer = %peer, topic, "dropping delivery to closed subscriber");
            }
        }
        Ok(())
    }
}

/// One peer's handle onto the mesh.
pub struct MeshHandle {
    mesh: Arc<GossipMesh>,
    peer: String,
}

impl MeshHandle {
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

#[async_trait]
impl Gossip for MeshHandle {
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), GossipError> {
        debug!(target: "gossip", peer = %self.peer, topic, size = data.len(), "publish");
        self.mesh.deliver(topic, &data).await
    }

    async fn subscribe(&self, pattern: &str) -> Result<mpsc::Receiver<GossipMessage>, GossipError> {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_DEPTH);
        let mut state = self.mesh.state.lock().map_err(|_| GossipError::Closed)?;
        state.subscriptions.push(Subscription {
            peer: self.peer.clone(),
            pattern: pattern.to_string(),
            sender,
        });
        Ok(receiver)
    }

    fn connected_peers(&self) -> Vec<String> {
        self.mesh
            .state
            .lock()
            .map(|state| {
                state
                    .peers
                    .iter()
                    .filter(|p| **p != self.peer)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
