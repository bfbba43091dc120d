// Path: crates/dispatch/src/handlers/commit.rs

//! COMMIT: tie a task to the content address of its produced artifact.

use crate::context::HandlerContext;
use crate::handlers::parse_payload;
use crate::ids;
use serde_json::json;
use swarm_types::envelope::Envelope;
use swarm_types::error::DispatchError;
use swarm_types::payload::CommitPayload;
use swarm_types::plan::OpType;
use tracing::info;

pub async fn handle(ctx: &HandlerContext, envelope: &Envelope) -> Result<(), DispatchError> {
    let payload: CommitPayload = parse_payload(envelope, "COMMIT")?;
    if payload.task_id.is_empty() || payload.artifact_hash.is_empty() {
        return Err(DispatchError::Validation(
            "commit requires task_id and artifact_hash".to_string(),
        ));
    }

    // The artifact must already exist in CAS.
    if !ctx.content_store.has(&payload.artifact_hash).await {
        return Err(DispatchError::Validation(format!(
            "artifact {} not found in content store",
            payload.artifact_hash
        )));
    }

    let commit_id = payload
        .commit_id
        .clone()
        .unwrap_or_else(|| ids::derive_id_str(&envelope.id, "commit"));
    let op = ctx.op_from_envelope(
        envelope,
        "commit",
        0,
        OpType::Annotate,
        payload.task_id.clone(),
        json!({
            "annotation_type": "commit",
            "commit_id": commit_id,
            "artifact_hash": payload.artifact_hash,
            "committer": envelope.actor_id(),
            "committed_at": envelope.ts_ns,
        }),
    );
    ctx.append(op)?;

    info!(
        target: "dispatch",
        commit = %commit_id,
        task = %payload.task_id,
        artifact = %payload.artifact_hash,
        "COMMIT recorded"
    );
    Ok(())
}
