// Path: crates/plan/src/lib.rs
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

//! The plan layer: Lamport time, the envelope factory, and the
//! authoritative append-only op-log every handler writes through.

pub mod envelope;
pub mod lamport;
pub mod store;
pub mod version;
pub mod wal;

pub use envelope::EnvelopeFactory;
pub use lamport::LamportClock;
pub use store::PlanStore;
pub use version::{PlanVersion, VersionTracker};
