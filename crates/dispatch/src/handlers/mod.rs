// Path: crates/dispatch/src/handlers/mod.rs

//! Per-verb handlers.
//!
//! Shared invariants: handlers never mutate the envelope; they may append
//! plan ops, mutate the lease registry, or emit new envelopes; and they
//! are idempotent under replay.

pub mod attest;
pub mod attest_plan;
pub mod claim;
pub mod commit;
pub mod decide;
pub mod finalize;
pub mod heartbeat;
pub mod need;
pub mod propose;
pub mod update_plan;
pub mod yield_release;

use serde::de::DeserializeOwned;
use swarm_types::envelope::Envelope;
use swarm_types::error::DispatchError;

/// Parse an envelope's payload into the verb's typed form.
pub(crate) fn parse_payload<T: DeserializeOwned>(
    envelope: &Envelope,
    kind: &'static str,
) -> Result<T, DispatchError> {
    serde_json::from_value(envelope.payload.clone()).map_err(|e| DispatchError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}
