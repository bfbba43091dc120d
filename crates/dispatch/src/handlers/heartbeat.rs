// Path: crates/dispatch/src/handlers/heartbeat.rs

//! HEARTBEAT: keep an active lease alive.

use crate::context::HandlerContext;
use crate::handlers::parse_payload;
use serde_json::json;
use swarm_types::envelope::Envelope;
use swarm_types::error::DispatchError;
use swarm_types::payload::HeartbeatPayload;
use swarm_types::plan::OpType;
use swarm_types::time::now_ns;
use tracing::{debug, warn};

pub async fn handle(ctx: &HandlerContext, envelope: &Envelope) -> Result<(), DispatchError> {
    let payload: HeartbeatPayload = parse_payload(envelope, "HEARTBEAT")?;

    let lease = ctx
        .lease_manager
        .get(&payload.lease_id)
        .ok_or(swarm_types::error::LeaseError::NotFound(payload.lease_id))?;

    // Worker-match is the acceptance condition; the manager re-checks
    // under its lock.
    let now = now_ns();
    ctx.lease_manager
        .heartbeat(&payload.lease_id, &payload.worker_id, now)?;
    ctx.heartbeat_protocol
        .receive_heartbeat(&payload.lease_id, now);

    // Out-of-range progress is dropped; the heartbeat still counts.
    let progress = match payload.progress {
        Some(p) if (0..=100).contains(&p) => Some(p),
        Some(p) => {
            warn!(target: "dispatch", progress = p, "invalid progress dropped");
            None
        }
        None => None,
    };

    let op = ctx.op_from_envelope(
        envelope,
        "heartbeat",
        0,
        OpType::Annotate,
        lease.task_id.clone(),
        json!({
            "annotation_type": "heartbeat",
            "lease_id": payload.lease_id,
            "worker_id": payload.worker_id,
            "progress": progress,
            "heartbeat_at": envelope.ts_ns,
        }),
    );
    ctx.append(op)?;

    debug!(
        target: "dispatch",
        lease = %payload.lease_id,
        worker = %payload.worker_id,
        ?progress,
        "HEARTBEAT recorded"
    );
    Ok(())
}
