// Path: crates/checkpoint/src/sync.rs

//! Fast-sync: bootstrap a fresh node from the latest signed checkpoint,
//! then replay only the ops past it.
//!
//! Any failure leaves the receiver clean: the replay tail is validated in
//! full before a single op is applied, and integrity failures surface as
//! errors so the caller can fall back to slow-sync.

use crate::manager::CheckpointManager;
use serde_json::Value;
use std::sync::Arc;
use swarm_plan::{LamportClock, PlanStore};
use swarm_types::checkpoint::SignedCheckpoint;
use swarm_types::error::SyncError;
use swarm_types::plan::PlanOp;
use tracing::{info, warn};

/// What a completed fast-sync did.
#[derive(Debug)]
pub struct FastSyncReport {
    pub checkpoint_epoch: u64,
    pub checkpoint_lamport: u64,
    /// The checkpoint's state summary, applied as the receiver's base
    /// state.
    pub state_summary: Value,
    pub applied_ops: usize,
}

pub struct FastSync {
    manager: Arc<CheckpointManager>,
    signature_quorum: usize,
}

impl FastSync {
    pub fn new(manager: Arc<CheckpointManager>, signature_quorum: usize) -> Self {
        Self {
            manager,
            signature_quorum,
        }
    }

    /// Sync `store` (and `clock`) from the latest checkpoint plus the
    /// replay tail fetched by `fetch_ops(checkpoint_lamport)`.
    pub fn sync<F>(
        &self,
        store: &PlanStore,
        clock: &LamportClock,
        fetch_ops: F,
    ) -> Result<FastSyncReport, SyncError>
    where
        F: FnOnce(u64) -> Vec<PlanOp>,
    {
        // 1. Latest signed checkpoint.
        let signed = self
            .manager
            .latest()
            .map_err(SyncError::Checkpoint)?
            .ok_or(SyncError::NoCheckpoint)?;

        // 2. Signature quorum.
        if !signed.has_quorum(self.signature_quorum) {
            return Err(SyncError::SignatureQuorum {
                got: signed.signatures.len(),
                required: self.signature_quorum,
            });
        }

        let checkpoint = &signed.checkpoint;
        info!(
            target: "sync",
            epoch = checkpoint.epoch,
            lamport = checkpoint.lamport,
            ops = checkpoint.op_count,
            "fast-sync from checkpoint"
        );

        // 3./4. Fetch the tail past the checkpoint.
        let ops = fetch_ops(checkpoint.lamport);

        // 5. Continuity: validate everything before applying anything.
        verify_continuity(&signed, &ops)?;

        // 6. Apply through the normal op-log path.
        let mut applied = 0;
        for op in &ops {
            if store.append(op.clone()).map_err(SyncError::Replay)? {
                applied += 1;
            }
        }
        let resume_lamport = ops
            .iter()
            .map(|op| op.lamport)
            .max()
            .unwrap_or(checkpoint.lamport);
        clock.observe(resume_lamport);
        store.set_epoch(
            ops.iter()
                .map(|op| op.epoch)
                .max()
                .unwrap_or(checkpoint.epoch),
        );

        info!(target: "sync", applied, "fast-sync complete");
        Ok(FastSyncReport {
            checkpoint_epoch: checkpoint.epoch,
            checkpoint_lamport: checkpoint.lamport,
            state_summary: checkpoint.state_summary.clone(),
            applied_ops: applied,
        })
    }
}

/// Replay ops must start after the checkpoint and be Lamport-monotone
/// non-decreasing in delivery order.
fn verify_continuity(signed: &SignedCheckpoint, ops: &[PlanOp]) -> Result<(), SyncError> {
    let checkpoint = &signed.checkpoint;
    let mut previous = checkpoint.lamport;
    for op in ops {
        if op.epoch <= checkpoint.epoch {
            warn!(target: "sync", op = %op.op_id, op_epoch = op.epoch, "op not after checkpoint epoch");
            return Err(SyncError::Continuity(format!(
                "op epoch {} not after checkpoint epoch {}",
                op.epoch, checkpoint.epoch
            )));
        }
        if op.lamport <= checkpoint.lamport {
            return Err(SyncError::Continuity(format!(
                "op lamport {} not after checkpoint lamport {}",
                op.lamport, checkpoint.lamport
            )));
        }
        if op.lamport < previous {
            return Err(SyncError::Continuity(
                "lamport values not monotonic in replay".to_string(),
            ));
        }
        previous = op.lamport;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use swarm_types::checkpoint::CheckpointSignature;
    use swarm_types::config::CheckpointConfig;
    use swarm_types::plan::OpType;
    use uuid::Uuid;

    fn op(lamport: u64, epoch: u64) -> PlanOp {
        PlanOp {
            op_id: Uuid::new_v4(),
            thread_id: "t1".into(),
            lamport,
            actor_id: "aa".into(),
            op_type: OpType::Annotate,
            task_id: "x".into(),
            payload: json!({"l": lamport}),
            timestamp_ns: lamport,
            epoch,
        }
    }

    fn manager_with_checkpoint(
        dir: &std::path::Path,
        epoch: u64,
        lamport: u64,
        signatures: usize,
    ) -> Arc<CheckpointManager> {
        let manager =
            Arc::new(CheckpointManager::open(dir, CheckpointConfig::default()).unwrap());
        let checkpoint = manager
            .create_checkpoint(epoch, json!({"x": {"state": "DECIDED"}}), &[], lamport, "ph")
            .unwrap();
        let sigs = (0..signatures)
            .map(|i| CheckpointSignature {
                verifier_id: format!("v{}", i),
                signature: "s".into(),
            })
            .collect();
        let signed = manager.sign_checkpoint(checkpoint, sigs).unwrap();
        manager.store(&signed).unwrap();
        manager
    }

    #[test]
    fn test_sync_applies_tail_and_resumes_clock() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_checkpoint(dir.path(), 4, 800, 1);
        let sync = FastSync::new(manager, 1);

        let store = PlanStore::new_in_memory();
        let clock = LamportClock::new();
        let tail: Vec<PlanOp> = (801..=1000).map(|l| op(l, 5)).collect();

        let report = sync
            .sync(&store, &clock, |after| {
                assert_eq!(after, 800);
                tail.clone()
            })
            .unwrap();

        assert_eq!(report.applied_ops, 200);
        assert_eq!(report.checkpoint_epoch, 4);
        assert_eq!(store.len(), 200);
        assert!(clock.current() > 1000);
        assert_eq!(store.current_epoch(), 5);
        assert_eq!(report.state_summary["x"]["state"], "DECIDED");
    }

    #[test]
    fn test_no_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager =
            Arc::new(CheckpointManager::open(dir.path(), CheckpointConfig::default()).unwrap());
        let sync = FastSync::new(manager, 1);
        let store = PlanStore::new_in_memory();
        let clock = LamportClock::new();
        assert!(matches!(
            sync.sync(&store, &clock, |_| Vec::new()),
            Err(SyncError::NoCheckpoint)
        ));
    }

    #[test]
    fn test_signature_quorum_failure() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_checkpoint(dir.path(), 1, 10, 1);
        let sync = FastSync::new(manager, 3);
        let store = PlanStore::new_in_memory();
        let clock = LamportClock::new();
        assert!(matches!(
            sync.sync(&store, &clock, |_| Vec::new()),
            Err(SyncError::SignatureQuorum { got: 1, required: 3 })
        ));
    }

    #[test]
    fn test_continuity_failure_applies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_checkpoint(dir.path(), 4, 800, 1);
        let sync = FastSync::new(manager, 1);
        let store = PlanStore::new_in_memory();
        let clock = LamportClock::new();

        // One op claims an epoch at/before the checkpoint: whole tail is
        // rejected and the store stays empty.
        let mut tail: Vec<PlanOp> = (801..=810).map(|l| op(l, 5)).collect();
        tail[5].epoch = 4;
        let err = sync.sync(&store, &clock, |_| tail).unwrap_err();
        assert!(matches!(err, SyncError::Continuity(_)));
        assert_eq!(store.len(), 0);

        // Non-monotone lamports likewise.
        let mut tail: Vec<PlanOp> = (801..=810).map(|l| op(l, 5)).collect();
        tail.swap(2, 7);
        assert!(matches!(
            sync.sync(&store, &clock, |_| tail),
            Err(SyncError::Continuity(_))
        ));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_empty_tail_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_with_checkpoint(dir.path(), 2, 100, 1);
        let sync = FastSync::new(manager, 1);
        let store = PlanStore::new_in_memory();
        let clock = LamportClock::new();
        let report = sync.sync(&store, &clock, |_| Vec::new()).unwrap();
        assert_eq!(report.applied_ops, 0);
        assert_eq!(store.current_epoch(), 2);
    }
}
