// Path: crates/dispatch/src/handlers/update_plan.rs

//! UPDATE_PLAN: apply a batch of plan ops, skipping individually-invalid
//! ones, and commit the resulting plan version.

use crate::context::HandlerContext;
use crate::handlers::parse_payload;
use crate::ids;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use swarm_types::envelope::Envelope;
use swarm_types::error::DispatchError;
use swarm_types::payload::UpdatePlanPayload;
use swarm_types::plan::OpType;
use tracing::{info, warn};

pub async fn handle(ctx: &HandlerContext, envelope: &Envelope) -> Result<(), DispatchError> {
    let payload: UpdatePlanPayload = parse_payload(envelope, "UPDATE_PLAN")?;
    if payload.ops.is_empty() {
        return Err(DispatchError::Validation(
            "no ops in update_plan payload".to_string(),
        ));
    }

    let patch_id = ids::derive_id_str(&envelope.id, "patch");
    let mut applied = 0usize;
    let mut lamport_offset = 0u64;
    let mut touched: Vec<String> = Vec::new();

    for (idx, raw) in payload.ops.iter().enumerate() {
        // Per-op validation: skip, never reject the whole batch.
        let op_type = match raw.op_type.as_deref().and_then(OpType::parse) {
            Some(op_type) => op_type,
            None => {
                warn!(target: "dispatch", index = idx, "skipping op: missing or unknown op_type");
                continue;
            }
        };
        let task_id = match raw.task_id.as_deref().filter(|t| !t.is_empty()) {
            Some(task_id) => task_id.to_string(),
            None => {
                warn!(target: "dispatch", index = idx, "skipping op: missing task_id");
                continue;
            }
        };
        match op_type {
            OpType::State if raw.payload.get("state").is_none() => {
                warn!(target: "dispatch", index = idx, "skipping STATE op without 'state'");
                continue;
            }
            OpType::Link
                if raw.payload.get("parent").is_none() || raw.payload.get("child").is_none() =>
            {
                warn!(target: "dispatch", index = idx, "skipping LINK op without parent/child");
                continue;
            }
            _ => {}
        }

        let payload_value = if raw.payload.is_null() {
            json!({})
        } else {
            raw.payload.clone()
        };
        let op = ctx.op_from_envelope(
            envelope,
            &format!("update_plan:{}", idx),
            lamport_offset,
            op_type,
            task_id.clone(),
            payload_value,
        );
        // Replays re-derive the same op ids; nothing re-applies, so the
        // version below is only recorded once.
        if ctx.append(op)? {
            applied += 1;
            touched.push(task_id);
        }
        lamport_offset += 1;
    }

    info!(
        target: "dispatch",
        patch = %patch_id,
        applied,
        total = payload.ops.len(),
        thread = %envelope.thread_id,
        "UPDATE_PLAN applied"
    );

    if applied == 0 {
        return Ok(());
    }

    // Version the plan over the touched tasks' derived state.
    touched.sort();
    touched.dedup();
    let mut plan_state = BTreeMap::new();
    for task_id in &touched {
        if let Some(view) = ctx.plan_store.task(task_id) {
            plan_state.insert(task_id.clone(), view);
        }
    }
    if !plan_state.is_empty() {
        let metadata: Value = json!({
            "thread_id": envelope.thread_id,
            "patch_id": patch_id,
            "actor_id": envelope.actor_id(),
            "ops_count": applied,
        });
        match ctx.version_tracker.record_version(
            &plan_state,
            envelope.lamport + lamport_offset - 1,
            metadata,
        ) {
            Ok(version) => info!(
                target: "dispatch",
                version = version.version_id,
                root = %version.merkle_root,
                "plan version recorded"
            ),
            Err(e) => warn!(target: "dispatch", "failed to record plan version: {}", e),
        }
    }
    Ok(())
}
