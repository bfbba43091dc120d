// Path: crates/plan/src/store.rs

//! The authoritative append-only op-log.
//!
//! Ops are totally ordered by `(lamport, op_id)`; task state is derived by
//! scanning that order, never stored. Appends go through the write-ahead
//! log first; the in-memory indexes are rebuilt from it on open.

use crate::wal::OpWal;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use swarm_types::error::PlanError;
use swarm_types::plan::{OpType, PlanOp, TaskState, TaskView};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Default)]
struct StoreInner {
    /// Total order: (lamport, op_id) -> op.
    ops: BTreeMap<(u64, Uuid), PlanOp>,
    /// op_id -> order key, for dedup, lookup, and eviction.
    by_id: HashMap<Uuid, (u64, Uuid)>,
}

pub struct PlanStore {
    inner: RwLock<StoreInner>,
    wal: Option<OpWal>,
    current_epoch: AtomicU64,
}

impl PlanStore {
    /// Volatile store, used by tests and fast-sync staging.
    pub fn new_in_memory() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            wal: None,
            current_epoch: AtomicU64::new(0),
        }
    }

    /// Durable store: replays the WAL at `path`, then appends to it.
    pub fn open(path: &Path) -> Result<Self, PlanError> {
        let wal = OpWal::open(path)?;
        let mut inner = StoreInner::default();
        let mut max_epoch = 0;
        for op in wal.replay()? {
            max_epoch = max_epoch.max(op.epoch);
            let key = op.order_key();
            if inner.by_id.insert(op.op_id, key).is_none() {
                inner.ops.insert(key, op);
            }
        }
        debug!(target: "plan", ops = inner.ops.len(), "op-log recovered from WAL");
        Ok(Self {
            inner: RwLock::new(inner),
            wal: Some(wal),
            current_epoch: AtomicU64::new(max_epoch),
        })
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch.load(Ordering::SeqCst)
    }

    /// Advance the epoch counter; new appends are stamped with it.
    pub fn set_epoch(&self, epoch: u64) {
        self.current_epoch.store(epoch, Ordering::SeqCst);
    }

    /// Append an op. Duplicate `op_id` is an idempotent no-op and returns
    /// `Ok(false)`. Ops arriving without an epoch are stamped with the
    /// store's current one.
    pub fn append(&self, mut op: PlanOp) -> Result<bool, PlanError> {
        if op.epoch == 0 {
            op.epoch = self.current_epoch();
        }
        {
            let inner = self.inner.read().map_err(|_| PlanError::LockPoisoned)?;
            if inner.by_id.contains_key(&op.op_id) {
                return Ok(false);
            }
        }
        if let Some(wal) = &self.wal {
            wal.append(&op)?;
        }
        let mut inner = self.inner.write().map_err(|_| PlanError::LockPoisoned)?;
        if inner.by_id.contains_key(&op.op_id) {
            return Ok(false);
        }
        let key = op.order_key();
        inner.by_id.insert(op.op_id, key);
        inner.ops.insert(key, op);
        Ok(true)
    }

    pub fn contains(&self, op_id: &Uuid) -> bool {
        self.inner
            .read()
            .map(|inner| inner.by_id.contains_key(op_id))
            .unwrap_or(false)
    }

    pub fn op(&self, op_id: &Uuid) -> Option<PlanOp> {
        let inner = self.inner.read().ok()?;
        let key = inner.by_id.get(op_id)?;
        inner.ops.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.ops.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every op, in total order.
    pub fn all_ops(&self) -> Vec<PlanOp> {
        self.inner
            .read()
            .map(|inner| inner.ops.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Ops for one thread, in total order.
    pub fn ops_for_thread(&self, thread_id: &str) -> Vec<PlanOp> {
        self.inner
            .read()
            .map(|inner| {
                inner
                    .ops
                    .values()
                    .filter(|op| op.thread_id == thread_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ops stamped with the given epoch, in total order.
    pub fn ops_in_epoch(&self, epoch: u64) -> Vec<PlanOp> {
        self.inner
            .read()
            .map(|inner| {
                inner
                    .ops
                    .values()
                    .filter(|op| op.epoch == epoch)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ops with Lamport strictly greater than `lamport`, in total order.
    /// Fast-sync serves replay requests from this.
    pub fn ops_after_lamport(&self, lamport: u64) -> Vec<PlanOp> {
        self.inner
            .read()
            .map(|inner| {
                inner
                    .ops
                    .range((lamport + 1, Uuid::nil())..)
                    .map(|(_, op)| op.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn max_lamport(&self) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.ops.keys().next_back().map(|(l, _)| *l))
            .unwrap_or(0)
    }

    /// Derived view of one task.
    pub fn task(&self, task_id: &str) -> Option<TaskView> {
        self.tasks().remove(task_id)
    }

    /// Derived views of every task, keyed by task id.
    pub fn tasks(&self) -> BTreeMap<String, TaskView> {
        let mut views: BTreeMap<String, TaskView> = BTreeMap::new();
        let inner = match self.inner.read() {
            Ok(inner) => inner,
            Err(_) => return views,
        };
        for op in inner.ops.values() {
            let view = views
                .entry(op.task_id.clone())
                .or_insert_with(|| TaskView::new(op.task_id.clone()));
            match op.op_type {
                OpType::AddTask => {
                    view.spec = Some(op.payload.clone());
                }
                OpType::State => {
                    let state = op
                        .payload
                        .get("state")
                        .and_then(Value::as_str)
                        .and_then(TaskState::parse);
                    match state {
                        Some(state) => view.state = state,
                        None => {
                            warn!(target: "plan", op_id = %op.op_id, "STATE op with unreadable state ignored")
                        }
                    }
                }
                OpType::Link => {
                    let parent = op.payload.get("parent").and_then(Value::as_str);
                    let child = op.payload.get("child").and_then(Value::as_str);
                    if let (Some(parent), Some(child)) = (parent, child) {
                        view.links.push((parent.to_string(), child.to_string()));
                    }
                }
                OpType::Annotate => {
                    view.annotations.push(op.payload.clone());
                }
            }
        }
        views
    }

    /// Serialized derived state of every task, the `state_summary` stored
    /// in checkpoints and applied by fast-sync.
    pub fn state_summary(&self) -> Value {
        let mut map = Map::new();
        for (task_id, view) in self.tasks() {
            if let Ok(value) = serde_json::to_value(&view) {
                map.insert(task_id, value);
            }
        }
        Value::Object(map)
    }

    /// Stable hash over the ops with Lamport in `[from, to]`, in total
    /// order. Replicas compare these to detect divergence.
    pub fn range_hash(&self, from_lamport: u64, to_lamport: u64) -> Result<String, PlanError> {
        use sha2::{Digest, Sha256};
        let inner = self.inner.read().map_err(|_| PlanError::LockPoisoned)?;
        let mut hasher = Sha256::new();
        for op in inner
            .ops
            .range((from_lamport, Uuid::nil())..=(to_lamport, Uuid::max()))
            .map(|(_, op)| op)
        {
            let h = op.hash().map_err(PlanError::Serialization)?;
            hasher.update(h.as_bytes());
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Remove ops from memory after they have been archived to cold
    /// storage. The WAL is untouched; cold storage is the read path for
    /// evicted ops.
    pub fn evict(&self, op_ids: &[Uuid]) -> usize {
        let mut inner = match self.inner.write() {
            Ok(inner) => inner,
            Err(_) => return 0,
        };
        let mut evicted = 0;
        for op_id in op_ids {
            if let Some(key) = inner.by_id.remove(op_id) {
                inner.ops.remove(&key);
                evicted += 1;
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(lamport: u64, thread: &str, task: &str, op_type: OpType, payload: Value) -> PlanOp {
        PlanOp {
            op_id: Uuid::new_v4(),
            thread_id: thread.into(),
            lamport,
            actor_id: "aa".into(),
            op_type,
            task_id: task.into(),
            payload,
            timestamp_ns: 1,
            epoch: 0,
        }
    }

    #[test]
    fn test_total_order_is_lamport_then_op_id() {
        let store = PlanStore::new_in_memory();
        let mut a = op(2, "t1", "x", OpType::Annotate, json!({"n": 1}));
        let mut b = op(2, "t1", "x", OpType::Annotate, json!({"n": 2}));
        // Force a known op_id ordering at equal Lamport.
        a.op_id = Uuid::from_u128(2);
        b.op_id = Uuid::from_u128(1);
        store.append(a.clone()).unwrap();
        store.append(b.clone()).unwrap();
        store
            .append(op(1, "t1", "x", OpType::Annotate, json!({"n": 0})))
            .unwrap();

        let ops = store.ops_for_thread("t1");
        let lamports: Vec<u64> = ops.iter().map(|o| o.lamport).collect();
        assert_eq!(lamports, vec![1, 2, 2]);
        assert_eq!(ops[1].op_id, b.op_id);
        assert_eq!(ops[2].op_id, a.op_id);
    }

    #[test]
    fn test_duplicate_append_is_noop() {
        let store = PlanStore::new_in_memory();
        let o = op(1, "t1", "x", OpType::Annotate, json!({}));
        assert!(store.append(o.clone()).unwrap());
        assert!(!store.append(o).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_task_derivation_latest_state_wins() {
        let store = PlanStore::new_in_memory();
        store
            .append(op(1, "t1", "x", OpType::AddTask, json!({"type": "gen"})))
            .unwrap();
        store
            .append(op(2, "t1", "x", OpType::State, json!({"state": "DECIDED"})))
            .unwrap();
        store
            .append(op(4, "t1", "x", OpType::State, json!({"state": "FINAL"})))
            .unwrap();
        store
            .append(op(3, "t1", "x", OpType::Annotate, json!({"annotation_type": "commit"})))
            .unwrap();

        let view = store.task("x").unwrap();
        assert_eq!(view.state, TaskState::Final);
        assert_eq!(view.spec, Some(json!({"type": "gen"})));
        assert_eq!(view.annotations.len(), 1);
    }

    #[test]
    fn test_release_reverts_to_draft() {
        let store = PlanStore::new_in_memory();
        store
            .append(op(1, "t1", "x", OpType::State, json!({"state": "DECIDED"})))
            .unwrap();
        store
            .append(op(2, "t1", "x", OpType::State, json!({"state": "DRAFT"})))
            .unwrap();
        assert_eq!(store.task("x").unwrap().state, TaskState::Draft);
    }

    #[test]
    fn test_range_hash_is_order_stable() {
        let a = PlanStore::new_in_memory();
        let b = PlanStore::new_in_memory();
        let ops: Vec<PlanOp> = (1..=5)
            .map(|l| op(l, "t1", "x", OpType::Annotate, json!({"l": l})))
            .collect();
        for o in &ops {
            a.append(o.clone()).unwrap();
        }
        for o in ops.iter().rev() {
            b.append(o.clone()).unwrap();
        }
        assert_eq!(a.range_hash(1, 5).unwrap(), b.range_hash(1, 5).unwrap());
        assert_ne!(a.range_hash(1, 4).unwrap(), a.range_hash(1, 5).unwrap());
    }

    #[test]
    fn test_wal_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oplog.jsonl");
        {
            let store = PlanStore::open(&path).unwrap();
            store.set_epoch(3);
            store
                .append(op(1, "t1", "x", OpType::AddTask, json!({"type": "gen"})))
                .unwrap();
            store
                .append(op(2, "t1", "x", OpType::State, json!({"state": "FINAL"})))
                .unwrap();
        }
        let reopened = PlanStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.current_epoch(), 3);
        assert_eq!(reopened.task("x").unwrap().state, TaskState::Final);
    }

    #[test]
    fn test_ops_after_lamport_and_evict() {
        let store = PlanStore::new_in_memory();
        let ops: Vec<PlanOp> = (1..=4)
            .map(|l| op(l, "t1", "x", OpType::Annotate, json!({"l": l})))
            .collect();
        for o in &ops {
            store.append(o.clone()).unwrap();
        }
        assert_eq!(store.ops_after_lamport(2).len(), 2);
        assert_eq!(store.evict(&[ops[0].op_id, ops[1].op_id]), 2);
        assert_eq!(store.len(), 2);
        assert!(!store.contains(&ops[0].op_id));
    }
}
