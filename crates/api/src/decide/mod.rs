// Path: crates/api/src/decide/mod.rs
//! The DECIDE coordinator contract.
//!
//! The only component in the system that demands linearizability. Backends
//! are a strongly-consistent KV store with compare-and-set, or a
//! replicated log with idempotent proposals; both live in the consensus
//! crate. The contract is pure CAS: no two callers can both observe
//! success for the same `need_id`.

use async_trait::async_trait;
use swarm_types::committee::DecideRecord;
use swarm_types::error::DecideError;

#[async_trait]
pub trait DecideCoordinator: Send + Sync {
    /// Attempt to register `record` as the decision for its `need_id`.
    ///
    /// Returns `Ok(Some(record))` iff this call is the first to register
    /// for the need; `Ok(None)` if another decision already won. Timeouts
    /// are errors; the caller retries later with the same inputs.
    async fn try_decide(&self, record: DecideRecord) -> Result<Option<DecideRecord>, DecideError>;

    /// Read back the winning record for a need, if any.
    async fn get_decision(&self, need_id: &str) -> Result<Option<DecideRecord>, DecideError>;
}
