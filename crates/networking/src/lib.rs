// Path: crates/networking/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]

//! The gossip substrate contract.
//!
//! The transport itself (pubsub mesh, peer discovery, NAT traversal) is an
//! external collaborator; the core assumes only publish/subscribe with
//! at-least-once, unordered delivery and no duplicate suppression. This
//! crate defines that contract, the topic conventions, and an in-process
//! mesh implementation used by single-host nodes and the e2e tests.

pub mod mesh;
pub mod topics;
pub mod traits;

pub use mesh::{GossipMesh, MeshHandle};
pub use topics::SwarmTopic;
pub use traits::{Gossip, GossipMessage};
