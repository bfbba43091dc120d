// Path: crates/dispatch/src/handlers/claim.rs

//! CLAIM and CLAIM_EXTENDED: take a task under a lease.

use crate::context::HandlerContext;
use crate::handlers::parse_payload;
use crate::ids;
use serde_json::json;
use swarm_types::envelope::Envelope;
use swarm_types::error::DispatchError;
use swarm_types::payload::{ClaimExtendedPayload, ClaimPayload};
use swarm_types::plan::{OpType, TaskState};
use swarm_types::time::now_ns;
use tracing::info;

/// Simple claim: annotation only, no lease bookkeeping.
pub async fn handle(ctx: &HandlerContext, envelope: &Envelope) -> Result<(), DispatchError> {
    let payload: ClaimPayload = parse_payload(envelope, "CLAIM")?;
    if payload.task_id.is_empty() {
        return Err(DispatchError::Validation("empty task_id".to_string()));
    }

    let claim_id = payload
        .claim_id
        .clone()
        .unwrap_or_else(|| ids::derive_id_str(&envelope.id, "claim"));
    let op = ctx.op_from_envelope(
        envelope,
        "claim",
        0,
        OpType::Annotate,
        payload.task_id.clone(),
        json!({
            "annotation_type": "claim",
            "claim_id": claim_id,
            "claimer": envelope.actor_id(),
            "lease_ttl": payload.lease_ttl,
            "claimed_at": envelope.ts_ns,
        }),
    );
    ctx.append(op)?;
    info!(
        target: "dispatch",
        claim = %claim_id,
        task = %payload.task_id,
        ttl = payload.lease_ttl,
        "CLAIM recorded"
    );
    Ok(())
}

/// Extended claim: validated lease registration plus STATE→DECIDED.
pub async fn handle_extended(
    ctx: &HandlerContext,
    envelope: &Envelope,
) -> Result<(), DispatchError> {
    let payload: ClaimExtendedPayload = parse_payload(envelope, "CLAIM_EXTENDED")?;
    if payload.task_id.is_empty() {
        return Err(DispatchError::Validation("empty task_id".to_string()));
    }
    if let Some(cost) = payload.cost {
        if cost <= 0.0 {
            return Err(DispatchError::Validation(format!(
                "cost must be positive, got {}",
                cost
            )));
        }
    }
    if let Some(eta) = payload.eta {
        if eta <= 0.0 {
            return Err(DispatchError::Validation(format!(
                "eta must be positive, got {}",
                eta
            )));
        }
    }

    let worker_id = payload
        .worker_id
        .clone()
        .unwrap_or_else(|| envelope.actor_id());
    let lease_id = ctx.derive_lease_id(&envelope.id);

    // TTL floor, heartbeat window, and per-task uniqueness are enforced
    // here; lease timing runs on local wall-clock.
    let lease = ctx.lease_manager.create(
        lease_id,
        &payload.task_id,
        &envelope.thread_id,
        &worker_id,
        payload.lease_ttl,
        payload.heartbeat_interval,
        now_ns(),
    )?;
    ctx.heartbeat_protocol
        .expect(lease.lease_id, lease.heartbeat_interval_secs, lease.created_at_ns);

    let claim_op = ctx.op_from_envelope(
        envelope,
        "claim_extended",
        0,
        OpType::Annotate,
        payload.task_id.clone(),
        json!({
            "annotation_type": "claim_extended",
            "lease_id": lease.lease_id,
            "worker_id": worker_id,
            "lease_ttl": payload.lease_ttl,
            "heartbeat_interval": payload.heartbeat_interval,
            "cost": payload.cost,
            "eta": payload.eta,
            "claimed_at": envelope.ts_ns,
        }),
    );
    ctx.append(claim_op)?;

    let state_op = ctx.op_from_envelope(
        envelope,
        "claim_state",
        1,
        OpType::State,
        payload.task_id.clone(),
        json!({"state": TaskState::Decided.as_str()}),
    );
    ctx.append(state_op)?;

    info!(
        target: "dispatch",
        lease = %lease.lease_id,
        task = %payload.task_id,
        worker = %worker_id,
        ttl = payload.lease_ttl,
        hb = payload.heartbeat_interval,
        "CLAIM_EXTENDED lease created"
    );
    Ok(())
}
