// Path: crates/networking/src/traits.rs
//! Trait definitions for the gossip substrate.

use async_trait::async_trait;
use swarm_types::error::GossipError;
use tokio::sync::mpsc;

/// A raw message delivered from the substrate.
#[derive(Debug, Clone)]
pub struct GossipMessage {
    pub topic: String,
    pub data: Vec<u8>,
}

/// The publish/subscribe contract the core assumes.
///
/// Delivery is at-least-once and unordered, with no duplicate suppression;
/// everything downstream (handler idempotence, Lamport observation) is
/// built to tolerate that.
#[async_trait]
pub trait Gossip: Send + Sync {
    /// Publish bytes on a topic.
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), GossipError>;

    /// Subscribe to a topic pattern (`*` wildcards accepted per segment).
    /// Messages arrive on the returned bounded channel; a slow consumer
    /// exerts backpressure on the substrate.
    async fn subscribe(&self, pattern: &str) -> Result<mpsc::Receiver<GossipMessage>, GossipError>;

    /// Peers currently visible to this node.
    fn connected_peers(&self) -> Vec<String>;
}
