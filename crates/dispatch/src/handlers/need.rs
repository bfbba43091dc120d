// Path: crates/dispatch/src/handlers/need.rs

//! NEED: initiate a new task request.

use crate::context::HandlerContext;
use crate::handlers::parse_payload;
use crate::ids;
use serde_json::json;
use swarm_types::envelope::Envelope;
use swarm_types::error::DispatchError;
use swarm_types::payload::NeedPayload;
use swarm_types::plan::OpType;
use tracing::info;

pub async fn handle(ctx: &HandlerContext, envelope: &Envelope) -> Result<(), DispatchError> {
    let payload: NeedPayload = parse_payload(envelope, "NEED")?;

    let task_id = ids::derive_id_str(&envelope.id, "task");
    let op = ctx.op_from_envelope(
        envelope,
        "add_task",
        0,
        OpType::AddTask,
        task_id.clone(),
        json!({
            "type": payload.task_type.unwrap_or_else(|| "generic".to_string()),
            "requires": payload.requires,
            "produces": payload.produces,
        }),
    );
    ctx.append(op)?;

    info!(
        target: "dispatch",
        task = %task_id,
        thread = %envelope.thread_id,
        "NEED created task"
    );
    Ok(())
}
