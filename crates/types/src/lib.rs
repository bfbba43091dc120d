// Path: crates/types/src/lib.rs
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

//! Core data structures and error types for the Swarm Kernel.
//!
//! Everything that crosses a crate boundary lives here: the signed envelope
//! and its closed verb set, plan-store operations and derived task state,
//! leases, committee records, checkpoint structures, typed per-verb payloads,
//! configuration, and the error taxonomy. Higher crates depend on this one
//! and never the other way around.

pub mod checkpoint;
pub mod codec;
pub mod committee;
pub mod config;
pub mod envelope;
pub mod error;
pub mod lease;
pub mod payload;
pub mod plan;
pub mod time;

pub use envelope::{Envelope, VerbKind, ENVELOPE_VERSION};
pub use plan::{OpType, PlanOp, TaskState, TaskView};
