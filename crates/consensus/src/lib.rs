// Path: crates/consensus/src/lib.rs
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

//! Atomic DECIDE coordination: at most one DECIDE per NEED.
//!
//! Two backends implement the `DecideCoordinator` contract. The `cas`
//! backend does compare-and-set on `decide/<need_id>` over a
//! strongly-consistent key-value store (exclusive file creation gives the
//! same first-wins guarantee across processes sharing a state dir). The
//! `raft` backend is the replicated-log shape: idempotent proposals keyed
//! by need id, first record wins on replay. Which one runs is a startup
//! choice (`--decide-backend`), never a per-call one.

pub mod kv;
pub mod log;

use std::path::Path;
use std::sync::Arc;
use swarm_api::DecideCoordinator;
use swarm_types::config::DecideBackend;
use swarm_types::error::DecideError;

pub use kv::KvCasCoordinator;
pub use log::LogCoordinator;

/// Construct the coordinator selected at startup, persisting under
/// `state_dir`.
pub fn coordinator_for(
    backend: DecideBackend,
    state_dir: &Path,
) -> Result<Arc<dyn DecideCoordinator>, DecideError> {
    match backend {
        DecideBackend::Cas => Ok(Arc::new(KvCasCoordinator::open(
            &state_dir.join("decide"),
        )?)),
        DecideBackend::Raft => Ok(Arc::new(LogCoordinator::open(
            &state_dir.join("decide-log.jsonl"),
        )?)),
    }
}
