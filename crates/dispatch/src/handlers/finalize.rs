// Path: crates/dispatch/src/handlers/finalize.rs

//! FINALIZE: mark a task complete.

use crate::context::HandlerContext;
use crate::handlers::parse_payload;
use serde_json::json;
use swarm_types::envelope::Envelope;
use swarm_types::error::DispatchError;
use swarm_types::payload::FinalizePayload;
use swarm_types::plan::{OpType, TaskState};
use tracing::info;

pub async fn handle(ctx: &HandlerContext, envelope: &Envelope) -> Result<(), DispatchError> {
    let payload: FinalizePayload = parse_payload(envelope, "FINALIZE")?;
    if payload.task_id.is_empty() {
        return Err(DispatchError::Validation("empty task_id".to_string()));
    }

    let state_op = ctx.op_from_envelope(
        envelope,
        "finalize_state",
        0,
        OpType::State,
        payload.task_id.clone(),
        json!({"state": TaskState::Final.as_str()}),
    );
    ctx.append(state_op)?;

    let annotate_op = ctx.op_from_envelope(
        envelope,
        "finalize_annotation",
        0,
        OpType::Annotate,
        payload.task_id.clone(),
        json!({
            "annotation_type": "finalize",
            "finalized_by": envelope.actor_id(),
            "finalized_at": envelope.ts_ns,
            "metadata": payload.metadata,
        }),
    );
    ctx.append(annotate_op)?;

    info!(target: "dispatch", task = %payload.task_id, "FINALIZE recorded");
    Ok(())
}
