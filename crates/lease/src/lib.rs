// Path: crates/lease/src/lib.rs
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

//! Lease and heartbeat coordination.
//!
//! Workers claim tasks under a TTL lease; heartbeats extend liveness; the
//! monitor scavenges expired or silent leases back to DRAFT by emitting
//! system-signed RELEASE envelopes.

pub mod heartbeat;
pub mod manager;
pub mod monitor;

pub use heartbeat::HeartbeatProtocol;
pub use manager::LeaseManager;
pub use monitor::{LeaseMonitor, ReleaseSink};
