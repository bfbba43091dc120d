// Path: crates/checkpoint/src/pruning.rs

//! Pruning: bound op-log growth by archiving ops older than the retention
//! window after each checkpoint.

use crate::storage::TieredStorage;
use std::sync::Arc;
use swarm_types::error::CheckpointError;
use swarm_types::plan::PlanOp;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PruningPolicy {
    /// Recent epochs kept hot.
    pub keep_epochs: u64,
}

impl PruningPolicy {
    pub fn new(keep_epochs: u64) -> Self {
        Self { keep_epochs }
    }

    /// An op is prunable once its epoch has fallen more than
    /// `keep_epochs` behind the current one.
    pub fn should_prune(&self, op_epoch: u64, current_epoch: u64) -> bool {
        current_epoch.saturating_sub(op_epoch) > self.keep_epochs
    }
}

impl Default for PruningPolicy {
    fn default() -> Self {
        Self { keep_epochs: 10 }
    }
}

pub struct PruningManager {
    policy: PruningPolicy,
    storage: Arc<TieredStorage>,
}

impl PruningManager {
    pub fn new(policy: PruningPolicy, storage: Arc<TieredStorage>) -> Self {
        Self { policy, storage }
    }

    pub fn policy(&self) -> &PruningPolicy {
        &self.policy
    }

    /// Partition `ops` by the policy and archive the old side. Returns
    /// `(moved, kept)` plus the moved ids so the op-log can evict them
    /// from memory.
    pub fn prune(
        &self,
        ops: &[PlanOp],
        current_epoch: u64,
    ) -> Result<(usize, usize, Vec<Uuid>), CheckpointError> {
        let (old, kept): (Vec<&PlanOp>, Vec<&PlanOp>) = ops
            .iter()
            .partition(|op| self.policy.should_prune(op.epoch, current_epoch));

        let to_move: Vec<PlanOp> = old.into_iter().cloned().collect();
        let moved_ids: Vec<Uuid> = to_move.iter().map(|op| op.op_id).collect();
        let moved = self.storage.move_to_cold(&to_move)?;

        info!(
            target: "checkpoint",
            current_epoch,
            moved,
            kept = kept.len(),
            "pruning pass complete"
        );
        Ok((moved, kept.len(), moved_ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use swarm_types::plan::OpType;

    fn op(id: u128, epoch: u64) -> PlanOp {
        PlanOp {
            op_id: Uuid::from_u128(id),
            thread_id: "t1".into(),
            lamport: id as u64 + 1,
            actor_id: "aa".into(),
            op_type: OpType::Annotate,
            task_id: "x".into(),
            payload: json!({"epoch": epoch}),
            timestamp_ns: 1,
            epoch,
        }
    }

    #[test]
    fn test_policy_boundary() {
        let policy = PruningPolicy::default();
        // current 15, keep 10: epochs <= 4 are prunable.
        assert!(policy.should_prune(4, 15));
        assert!(!policy.should_prune(5, 15));
        assert!(!policy.should_prune(15, 15));
    }

    #[test]
    fn test_prune_partitions_and_archives() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(TieredStorage::open(dir.path()).unwrap());
        let manager = PruningManager::new(PruningPolicy::new(2), Arc::clone(&storage));

        let ops: Vec<PlanOp> = (0..6).map(|i| op(i, i as u64)).collect();
        // current epoch 5, keep 2: epochs 0..=2 move, 3..=5 stay.
        let (moved, kept, moved_ids) = manager.prune(&ops, 5).unwrap();
        assert_eq!(moved, 3);
        assert_eq!(kept, 3);
        assert_eq!(moved_ids.len(), 3);
        assert_eq!(storage.cold_len(), 3);

        for o in &ops {
            if o.epoch <= 2 {
                assert_eq!(storage.get(&o.op_id).as_ref(), Some(o));
            }
        }
    }
}
