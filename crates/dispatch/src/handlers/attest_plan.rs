// Path: crates/dispatch/src/handlers/attest_plan.rs

//! ATTEST_PLAN: verifier attestation for proposals, quorum-counted; the
//! Kth distinct approval elects the DECIDE.

use crate::context::HandlerContext;
use crate::handlers::parse_payload;
use serde_json::json;
use swarm_types::committee::{DecideRecord, Verdict};
use swarm_types::envelope::{Envelope, VerbKind};
use swarm_types::error::DispatchError;
use swarm_types::payload::{AttestPlanPayload, DecidePayload};
use swarm_types::plan::OpType;
use tracing::{info, warn};

/// Decider recorded for quorum-elected decisions.
const QUORUM_DECIDER: &str = "quorum-system";

pub async fn handle(ctx: &HandlerContext, envelope: &Envelope) -> Result<(), DispatchError> {
    let payload: AttestPlanPayload = parse_payload(envelope, "ATTEST_PLAN")?;
    let sender = envelope.actor_id();

    // Only approvals count toward quorum; rejections are logged and
    // dropped without state change.
    if payload.verdict != Verdict::Approve {
        info!(
            target: "dispatch",
            proposal = %payload.proposal_id,
            verifier = %sender,
            "ATTEST_PLAN rejection not counted"
        );
        return Ok(());
    }

    // Verifier-restricted: must be an active pool member with stake.
    ctx.verifier_pool
        .check_eligible(&sender, ctx.quorum_config.min_stake)?;

    if ctx
        .quorum_tracker
        .has_approved(&payload.need_id, &payload.proposal_id, &sender)
    {
        // Replay or duplicate vote: record nothing, report conflict.
        return Err(DispatchError::Conflict(format!(
            "duplicate attestation from {} for proposal {}",
            sender, payload.proposal_id
        )));
    }

    let k_plan = ctx.current_k_plan();
    let quorum_reached =
        ctx.quorum_tracker
            .record(&payload.need_id, &payload.proposal_id, &sender, k_plan);

    let op = ctx.op_from_envelope(
        envelope,
        "attest_plan",
        0,
        OpType::Annotate,
        payload.need_id.clone(),
        json!({
            "annotation_type": "attest_plan",
            "proposal_id": payload.proposal_id,
            "verifier": sender,
            "verdict": payload.verdict,
            "attested_at": envelope.ts_ns,
        }),
    );
    ctx.append(op)?;

    let count = ctx
        .quorum_tracker
        .count(&payload.need_id, &payload.proposal_id);
    info!(
        target: "dispatch",
        need = %payload.need_id,
        proposal = %payload.proposal_id,
        count,
        k_plan,
        "ATTEST_PLAN approval recorded"
    );

    if !quorum_reached {
        return Ok(());
    }
    info!(
        target: "dispatch",
        proposal = %payload.proposal_id,
        k_plan,
        "quorum reached"
    );

    let epoch = ctx.plan_store.current_epoch().max(1);
    let record = DecideRecord {
        need_id: payload.need_id.clone(),
        proposal_id: payload.proposal_id.clone(),
        epoch,
        lamport: envelope.lamport,
        k_plan,
        decider_id: QUORUM_DECIDER.to_string(),
        timestamp_ns: envelope.ts_ns,
    };

    match ctx.try_decide(record).await? {
        Some(record) => {
            info!(
                target: "dispatch",
                need = %record.need_id,
                proposal = %record.proposal_id,
                "DECIDE registered"
            );
            // Out-of-band DECIDE envelope so every node updates its plan
            // store.
            let decide_payload = serde_json::to_value(DecidePayload {
                need_id: record.need_id.clone(),
                proposal_id: record.proposal_id.clone(),
                task_id: Some(record.need_id.clone()),
                epoch: record.epoch,
                k_plan: Some(record.k_plan),
            })
            .map_err(|e| DispatchError::Validation(e.to_string()))?;
            let decide_env = ctx
                .factory
                .make_signed(VerbKind::Decide, envelope.thread_id.clone(), decide_payload)?;
            if let Err(e) = ctx.publish(&decide_env).await {
                warn!(target: "dispatch", "failed to publish DECIDE envelope: {}", e);
            }
        }
        None => {
            info!(target: "dispatch", need = %payload.need_id, "DECIDE already exists (conflict)");
        }
    }
    Ok(())
}
