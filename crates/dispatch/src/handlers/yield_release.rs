// Path: crates/dispatch/src/handlers/yield_release.rs

//! YIELD (voluntary) and RELEASE (system-initiated): give a task back to
//! the swarm by reverting it to DRAFT.

use crate::context::HandlerContext;
use crate::handlers::parse_payload;
use serde_json::json;
use swarm_types::envelope::Envelope;
use swarm_types::error::DispatchError;
use swarm_types::payload::{ReleasePayload, YieldPayload};
use swarm_types::plan::{OpType, TaskState};
use tracing::info;

pub async fn handle_yield(ctx: &HandlerContext, envelope: &Envelope) -> Result<(), DispatchError> {
    let payload: YieldPayload = parse_payload(envelope, "YIELD")?;
    if payload.task_id.is_empty() {
        return Err(DispatchError::Validation("empty task_id".to_string()));
    }

    // A yielded task's lease is done; drop it so the monitor does not
    // release it a second time.
    if let Some(lease) = ctx.lease_manager.lease_for_task(&payload.task_id) {
        ctx.heartbeat_protocol.remove_expectation(&lease.lease_id);
        ctx.lease_manager.delete(&lease.lease_id);
    }

    let annotate_op = ctx.op_from_envelope(
        envelope,
        "yield",
        0,
        OpType::Annotate,
        payload.task_id.clone(),
        json!({
            "annotation_type": "yield",
            "yielder": envelope.actor_id(),
            "reason": payload.reason,
            "yielded_at": envelope.ts_ns,
        }),
    );
    ctx.append(annotate_op)?;

    let state_op = ctx.op_from_envelope(
        envelope,
        "yield_state",
        1,
        OpType::State,
        payload.task_id.clone(),
        json!({"state": TaskState::Draft.as_str()}),
    );
    ctx.append(state_op)?;

    info!(
        target: "dispatch",
        task = %payload.task_id,
        reason = %payload.reason,
        "YIELD recorded"
    );
    Ok(())
}

pub async fn handle_release(
    ctx: &HandlerContext,
    envelope: &Envelope,
) -> Result<(), DispatchError> {
    let payload: ReleasePayload = parse_payload(envelope, "RELEASE")?;
    if payload.task_id.is_empty() {
        return Err(DispatchError::Validation("empty task_id".to_string()));
    }

    // The emitting monitor already deleted its lease; other replicas
    // clean up theirs here.
    if ctx.lease_manager.get(&payload.lease_id).is_some() {
        ctx.heartbeat_protocol.remove_expectation(&payload.lease_id);
        ctx.lease_manager.delete(&payload.lease_id);
    }

    let annotate_op = ctx.op_from_envelope(
        envelope,
        "release",
        0,
        OpType::Annotate,
        payload.task_id.clone(),
        json!({
            "annotation_type": "release",
            "lease_id": payload.lease_id,
            "reason": payload.reason,
            "released_at": envelope.ts_ns,
            "system_initiated": true,
        }),
    );
    ctx.append(annotate_op)?;

    // Scavenge: the task goes back to DRAFT for re-claiming.
    let state_op = ctx.op_from_envelope(
        envelope,
        "release_state",
        1,
        OpType::State,
        payload.task_id.clone(),
        json!({"state": TaskState::Draft.as_str()}),
    );
    ctx.append(state_op)?;

    info!(
        target: "dispatch",
        lease = %payload.lease_id,
        task = %payload.task_id,
        reason = payload.reason.as_str(),
        "RELEASE recorded"
    );
    Ok(())
}
