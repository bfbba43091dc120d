// Path: crates/types/src/payload.rs

//! Typed per-verb payloads.
//!
//! The wire format stays canonical JSON; the dispatch boundary parses each
//! envelope's payload into the record for its verb so handler code never
//! touches free-form maps. Missing optional fields take the defaults the
//! protocol defines.

use crate::committee::Verdict;
use crate::lease::ReleaseReason;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn default_claim_ttl() -> u64 {
    300
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_yield_reason() -> String {
    "voluntary_yield".to_string()
}

fn default_verdict() -> Verdict {
    Verdict::Approve
}

fn default_epoch() -> u64 {
    1
}

/// NEED: initiate a task request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NeedPayload {
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub produces: Vec<String>,
}

/// PROPOSE: simple proposal against a NEED.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposePayload {
    #[serde(default)]
    pub need_id: Option<String>,
    #[serde(default)]
    pub proposal_id: Option<String>,
    #[serde(default)]
    pub plan: Vec<Value>,
    #[serde(default)]
    pub metadata: Value,
}

/// A raw op inside a PROPOSE_EXTENDED patch or UPDATE_PLAN batch. Kept
/// loosely typed on purpose: each entry is validated individually and
/// invalid entries are skipped, never the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchOp {
    #[serde(default)]
    pub op_type: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

/// PROPOSE_EXTENDED: ballot-tracked proposal carrying a plan patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeExtendedPayload {
    pub need_id: String,
    #[serde(default)]
    pub proposal_id: Option<String>,
    pub ballot: String,
    #[serde(default)]
    pub patch: Vec<PatchOp>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub eta: Option<f64>,
}

/// ATTEST: worker-commit attestation, subject to the commit gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestPayload {
    pub commit_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub need_id: Option<String>,
    #[serde(default)]
    pub proposal_id: Option<String>,
    #[serde(default)]
    pub attestation_id: Option<String>,
    #[serde(default = "default_verdict")]
    pub verdict: Verdict,
    #[serde(default)]
    pub telemetry: Value,
    /// Claimed resources the commit gate compares against telemetry.
    #[serde(default)]
    pub resources: Value,
}

/// ATTEST_PLAN: verifier attestation counted toward quorum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestPlanPayload {
    pub need_id: String,
    pub proposal_id: String,
    #[serde(default = "default_verdict")]
    pub verdict: Verdict,
}

/// DECIDE: atomic decision for a NEED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecidePayload {
    pub need_id: String,
    pub proposal_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default = "default_epoch")]
    pub epoch: u64,
    #[serde(default)]
    pub k_plan: Option<usize>,
}

/// CLAIM: simple claim annotation with a lease TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimPayload {
    pub task_id: String,
    #[serde(default)]
    pub claim_id: Option<String>,
    #[serde(default = "default_claim_ttl")]
    pub lease_ttl: u64,
}

/// CLAIM_EXTENDED: full lease registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimExtendedPayload {
    pub task_id: String,
    #[serde(default)]
    pub worker_id: Option<String>,
    pub lease_ttl: u64,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub eta: Option<f64>,
}

/// HEARTBEAT: keep-alive for an active lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub lease_id: Uuid,
    pub worker_id: String,
    /// Optional progress in 0..=100; out-of-range values are dropped.
    #[serde(default)]
    pub progress: Option<i64>,
}

/// COMMIT: tie a task to its produced content address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitPayload {
    pub task_id: String,
    pub artifact_hash: String,
    #[serde(default)]
    pub commit_id: Option<String>,
}

/// FINALIZE: mark a task complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizePayload {
    pub task_id: String,
    #[serde(default)]
    pub metadata: Value,
}

/// YIELD: voluntary release back to DRAFT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldPayload {
    pub task_id: String,
    #[serde(default = "default_yield_reason")]
    pub reason: String,
}

/// RELEASE: system-initiated lease expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleasePayload {
    pub task_id: String,
    pub lease_id: Uuid,
    pub reason: ReleaseReason,
}

/// UPDATE_PLAN: batch of plan ops applied with per-op validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePlanPayload {
    #[serde(default)]
    pub ops: Vec<PatchOp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let claim: ClaimPayload = serde_json::from_value(json!({"task_id": "t"})).unwrap();
        assert_eq!(claim.lease_ttl, 300);

        let attest: AttestPlanPayload =
            serde_json::from_value(json!({"need_id": "n", "proposal_id": "p"})).unwrap();
        assert_eq!(attest.verdict, Verdict::Approve);
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let res: Result<CommitPayload, _> = serde_json::from_value(json!({"task_id": "t"}));
        assert!(res.is_err());
    }
}
