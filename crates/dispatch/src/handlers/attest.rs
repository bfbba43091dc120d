// Path: crates/dispatch/src/handlers/attest.rs

//! ATTEST: worker-commit attestation, gated by the commit-gate policy.

use crate::context::HandlerContext;
use crate::handlers::parse_payload;
use crate::ids;
use serde_json::json;
use swarm_types::codec;
use swarm_types::committee::{DecideRecord, Verdict};
use swarm_types::envelope::Envelope;
use swarm_types::error::DispatchError;
use swarm_types::payload::AttestPayload;
use swarm_types::plan::OpType;
use tracing::{info, warn};

pub async fn handle(ctx: &HandlerContext, envelope: &Envelope) -> Result<(), DispatchError> {
    let payload: AttestPayload = parse_payload(envelope, "ATTEST")?;

    // Commit gate: claimed vs actual resources. A violation records the
    // attestation as rejected rather than dropping it.
    let decision = ctx.gates.commit_gate_validate(envelope, &payload.telemetry);
    let verdict = if decision.allowed {
        payload.verdict
    } else {
        warn!(
            target: "dispatch",
            commit = %payload.commit_id,
            reason = decision.reason.as_deref().unwrap_or("unknown"),
            "commit gate rejected attestation"
        );
        Verdict::Reject
    };

    // Digest of the evaluation so the decision is auditable later.
    let eval_digest = codec::hash_canonical(&json!({
        "commit_id": payload.commit_id,
        "task_id": payload.task_id,
        "attester": envelope.actor_id(),
        "allowed": decision.allowed,
        "reason": decision.reason,
        "gas_used": decision.gas_used,
        "policy_hash": decision.policy_hash,
    }))
    .map_err(DispatchError::Validation)?;

    let attestation_id = payload
        .attestation_id
        .clone()
        .unwrap_or_else(|| ids::derive_id_str(&envelope.id, "attestation"));
    let task_id = payload
        .task_id
        .clone()
        .unwrap_or_else(|| "unknown".to_string());

    let op = ctx.op_from_envelope(
        envelope,
        "attestation",
        0,
        OpType::Annotate,
        task_id,
        json!({
            "annotation_type": "attestation",
            "attestation_id": attestation_id,
            "commit_id": payload.commit_id,
            "attester": envelope.actor_id(),
            "verdict": verdict,
            "attested_at": envelope.ts_ns,
            "policy_eval_digest": eval_digest,
            "policy_allowed": decision.allowed,
            "gas_used": decision.gas_used,
        }),
    );
    ctx.append(op)?;
    info!(
        target: "dispatch",
        attestation = %attestation_id,
        commit = %payload.commit_id,
        ?verdict,
        "ATTEST recorded"
    );

    if verdict == Verdict::Reject {
        return Ok(());
    }

    // Threshold check for the worker-commit path. The count scans the
    // thread's annotations, so replays (which appended nothing) cannot
    // inflate it.
    let threshold = ctx.quorum_config.attest_threshold;
    let attestations = ctx
        .plan_store
        .ops_for_thread(&envelope.thread_id)
        .into_iter()
        .filter(|op| {
            op.op_type == OpType::Annotate
                && op.payload.get("annotation_type").and_then(|v| v.as_str())
                    == Some("attestation")
                && op.payload.get("commit_id").and_then(|v| v.as_str())
                    == Some(payload.commit_id.as_str())
        })
        .count();

    if attestations >= threshold {
        let proposal_id = payload
            .proposal_id
            .clone()
            .unwrap_or_else(|| payload.commit_id.clone());
        let need_id = payload
            .need_id
            .clone()
            .unwrap_or_else(|| "default-need".to_string());

        let record = DecideRecord {
            need_id: need_id.clone(),
            proposal_id: proposal_id.clone(),
            epoch: ctx.plan_store.current_epoch().max(1),
            lamport: envelope.lamport,
            k_plan: attestations,
            decider_id: envelope.actor_id(),
            timestamp_ns: envelope.ts_ns,
        };
        match ctx.try_decide(record).await? {
            Some(_) => {
                info!(target: "dispatch", need = %need_id, proposal = %proposal_id, "ATTEST triggered DECIDE")
            }
            None => {
                info!(target: "dispatch", need = %need_id, "DECIDE already exists")
            }
        }
    }
    Ok(())
}
