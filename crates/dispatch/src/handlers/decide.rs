// Path: crates/dispatch/src/handlers/decide.rs

//! DECIDE: atomic decision recording.
//!
//! The adapter gives at-most-once registration per NEED. A conflict
//! against a *different* proposal is a no-op; seeing our own (need,
//! proposal) already registered is the confirmation path, the envelope
//! emitted by the electing node, and still records the plan ops, which
//! are idempotent by derived id.

use crate::context::HandlerContext;
use crate::handlers::parse_payload;
use serde_json::json;
use swarm_types::committee::DecideRecord;
use swarm_types::envelope::Envelope;
use swarm_types::error::DispatchError;
use swarm_types::payload::DecidePayload;
use swarm_types::plan::{OpType, TaskState};
use tracing::{debug, info};

pub async fn handle(ctx: &HandlerContext, envelope: &Envelope) -> Result<(), DispatchError> {
    let payload: DecidePayload = parse_payload(envelope, "DECIDE")?;

    let record = DecideRecord {
        need_id: payload.need_id.clone(),
        proposal_id: payload.proposal_id.clone(),
        epoch: payload.epoch,
        lamport: envelope.lamport,
        k_plan: payload.k_plan.unwrap_or(1),
        decider_id: envelope.actor_id(),
        timestamp_ns: envelope.ts_ns,
    };

    let winner = match ctx.try_decide(record).await? {
        Some(record) => {
            info!(
                target: "dispatch",
                need = %record.need_id,
                proposal = %record.proposal_id,
                "atomic DECIDE recorded"
            );
            record
        }
        None => {
            let existing = ctx.decide.get_decision(&payload.need_id).await?;
            match existing {
                Some(existing) if existing.proposal_id == payload.proposal_id => {
                    // Confirmation of the decision this envelope carries;
                    // fall through and record the ops.
                    debug!(target: "dispatch", need = %payload.need_id, "DECIDE confirmation");
                    existing
                }
                _ => {
                    return Err(DispatchError::Conflict(format!(
                        "DECIDE already exists for need {}",
                        payload.need_id
                    )));
                }
            }
        }
    };

    if let Some(task_id) = &payload.task_id {
        let state_op = ctx.op_from_envelope(
            envelope,
            "decide_state",
            0,
            OpType::State,
            task_id.clone(),
            json!({"state": TaskState::Decided.as_str()}),
        );
        ctx.append(state_op)?;
    }

    let annotate_op = ctx.op_from_envelope(
        envelope,
        "decide_annotation",
        0,
        OpType::Annotate,
        payload
            .task_id
            .clone()
            .unwrap_or_else(|| payload.need_id.clone()),
        json!({
            "annotation_type": "decide",
            "need_id": winner.need_id,
            "proposal_id": winner.proposal_id,
            "epoch": winner.epoch,
            "k_plan": winner.k_plan,
            "decider": winner.decider_id,
            "decided_at": envelope.ts_ns,
        }),
    );
    ctx.append(annotate_op)?;
    Ok(())
}
