// Path: crates/dispatch/src/handlers/propose.rs

//! PROPOSE and PROPOSE_EXTENDED: record proposals against a NEED.

use crate::context::HandlerContext;
use crate::handlers::parse_payload;
use crate::ids;
use serde_json::json;
use swarm_types::envelope::Envelope;
use swarm_types::error::DispatchError;
use swarm_types::payload::{PatchOp, ProposeExtendedPayload, ProposePayload};
use swarm_types::plan::OpType;
use tracing::{info, warn};

pub async fn handle(ctx: &HandlerContext, envelope: &Envelope) -> Result<(), DispatchError> {
    let payload: ProposePayload = parse_payload(envelope, "PROPOSE")?;

    let proposal_id = payload
        .proposal_id
        .unwrap_or_else(|| ids::derive_id_str(&envelope.id, "proposal"));
    // Proposals without a NEED reference land in the thread-global bucket.
    let task_id = payload.need_id.unwrap_or_else(|| "global".to_string());

    let op = ctx.op_from_envelope(
        envelope,
        "proposal",
        0,
        OpType::Annotate,
        task_id,
        json!({
            "annotation_type": "proposal",
            "proposal_id": proposal_id,
            "plan": payload.plan,
            "proposer": envelope.actor_id(),
            "metadata": payload.metadata,
        }),
    );
    ctx.append(op)?;

    info!(target: "dispatch", proposal = %proposal_id, thread = %envelope.thread_id, "PROPOSE recorded");
    Ok(())
}

pub async fn handle_extended(
    ctx: &HandlerContext,
    envelope: &Envelope,
) -> Result<(), DispatchError> {
    let payload: ProposeExtendedPayload = parse_payload(envelope, "PROPOSE_EXTENDED")?;
    let sender = envelope.actor_id();

    if payload.ballot.is_empty() {
        return Err(DispatchError::Validation("empty ballot".to_string()));
    }
    if payload.patch.is_empty() {
        return Err(DispatchError::Validation("empty patch".to_string()));
    }

    // Each invalid patch op is dropped individually; an all-invalid patch
    // rejects the proposal.
    let valid_ops: Vec<&PatchOp> = payload
        .patch
        .iter()
        .enumerate()
        .filter_map(|(idx, op)| {
            let has_type = op
                .op_type
                .as_deref()
                .is_some_and(|t| swarm_types::plan::OpType::parse(t).is_some());
            let has_task = op.task_id.as_deref().is_some_and(|t| !t.is_empty());
            if has_type && has_task {
                Some(op)
            } else {
                warn!(target: "dispatch", index = idx, "skipping invalid patch op in proposal");
                None
            }
        })
        .collect();
    if valid_ops.is_empty() {
        return Err(DispatchError::Validation(
            "no valid operations in patch".to_string(),
        ));
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

    if !ctx.register_ballot(&sender, &payload.ballot) {
        return Err(DispatchError::Conflict(format!(
            "duplicate ballot '{}' from proposer",
            payload.ballot
        )));
    }

    let proposal_id = payload
        .proposal_id
        .unwrap_or_else(|| ids::derive_id_str(&envelope.id, "proposal"));
    let patch_json: Vec<_> = valid_ops
        .iter()
        .map(|op| serde_json::to_value(op).unwrap_or_default())
        .collect();

    let op = ctx.op_from_envelope(
        envelope,
        "proposal_extended",
        0,
        OpType::Annotate,
        payload.need_id.clone(),
        json!({
            "annotation_type": "proposal_extended",
            "proposal_id": proposal_id,
            "ballot": payload.ballot,
            "patch": patch_json,
            "cost": payload.cost,
            "eta": payload.eta,
            "proposer": sender,
            "proposed_at": envelope.ts_ns,
        }),
    );
    ctx.append(op)?;

    info!(
        target: "dispatch",
        proposal = %proposal_id,
        ballot = %payload.ballot,
        need = %payload.need_id,
        "PROPOSE_EXTENDED recorded"
    );
    Ok(())
}
