// Path: crates/api/src/lib.rs
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

//! External-collaborator interfaces for the Swarm Kernel.
//!
//! The core treats content storage, the credit ledger, and the DECIDE
//! coordinator as pluggable backends; only their contracts live here, plus
//! local implementations good enough for single-host deployments and tests.
//! Production deployments swap in IPFS-backed storage or a shared
//! coordinator without touching core code.

pub mod cas;
pub mod decide;
pub mod ledger;

pub use cas::{ContentStore, LocalBlobStore};
pub use decide::DecideCoordinator;
pub use ledger::{CreditLedger, MemoryLedger};
