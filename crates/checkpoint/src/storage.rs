// Path: crates/checkpoint/src/storage.rs

//! Two-tier op storage: hot in-memory map, cold 2-char-sharded files.
//!
//! Layout: `<root>/<op_id[..2]>/<op_id>.json`, with `<root>/index.json`
//! tracking archived op ids so existence checks never scan the disk.

use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use swarm_types::error::CheckpointError;
use swarm_types::plan::PlanOp;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct TieredStorage {
    hot: RwLock<HashMap<Uuid, PlanOp>>,
    cold_root: PathBuf,
    cold_index: Mutex<HashSet<Uuid>>,
}

impl TieredStorage {
    pub fn open(cold_root: &Path) -> Result<Self, CheckpointError> {
        std::fs::create_dir_all(cold_root)?;
        let storage = Self {
            hot: RwLock::new(HashMap::new()),
            cold_root: cold_root.to_path_buf(),
            cold_index: Mutex::new(HashSet::new()),
        };
        storage.load_index()?;
        Ok(storage)
    }

    fn index_path(&self) -> PathBuf {
        self.cold_root.join("index.json")
    }

    fn op_path(&self, op_id: &Uuid) -> PathBuf {
        let id = op_id.to_string();
        self.cold_root.join(&id[..2]).join(format!("{}.json", id))
    }

    fn load_index(&self) -> Result<(), CheckpointError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(());
        }
        let bytes = std::fs::read(&path)?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        let mut index = match self.cold_index.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for id in value
            .get("op_ids")
            .and_then(serde_json::Value::as_array)
            .into_iter()
            .flatten()
        {
            match id.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                Some(op_id) => {
                    index.insert(op_id);
                }
                None => warn!(target: "checkpoint", "skipping malformed cold-index entry"),
            }
        }
        debug!(target: "checkpoint", archived = index.len(), "cold index loaded");
        Ok(())
    }

    fn save_index(&self) -> Result<(), CheckpointError> {
        let ids: Vec<String> = {
            let index = match self.cold_index.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            index.iter().map(Uuid::to_string).collect()
        };
        let bytes = serde_json::to_vec(&json!({ "op_ids": ids }))
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
        // Write-then-rename keeps the index readable if we crash
        // mid-write.
        let tmp = self.index_path().with_extension("json.tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, self.index_path())?;
        Ok(())
    }

    pub fn add_hot(&self, op: PlanOp) {
        if let Ok(mut hot) = self.hot.write() {
            hot.insert(op.op_id, op);
        }
    }

    /// Archive ops: write each to its shard, drop it from hot, update the
    /// index once at the end. Returns how many moved.
    pub fn move_to_cold(&self, ops: &[PlanOp]) -> Result<usize, CheckpointError> {
        let mut moved = 0;
        for op in ops {
            let path = self.op_path(&op.op_id);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let bytes = serde_json::to_vec(op)
                .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
            std::fs::write(&path, &bytes)?;

            if let Ok(mut hot) = self.hot.write() {
                hot.remove(&op.op_id);
            }
            if let Ok(mut index) = self.cold_index.lock() {
                index.insert(op.op_id);
            }
            moved += 1;
        }
        self.save_index()?;
        info!(target: "checkpoint", moved, "ops archived to cold storage");
        Ok(moved)
    }

    /// Read one op, hot tier first, then the cold index + shard file.
    pub fn get(&self, op_id: &Uuid) -> Option<PlanOp> {
        if let Ok(hot) = self.hot.read() {
            if let Some(op) = hot.get(op_id) {
                return Some(op.clone());
            }
        }
        let archived = self
            .cold_index
            .lock()
            .map(|index| index.contains(op_id))
            .unwrap_or(false);
        if !archived {
            return None;
        }
        let bytes = std::fs::read(self.op_path(op_id)).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(op) => Some(op),
            Err(e) => {
                warn!(target: "checkpoint", op = %op_id, "unreadable cold op: {}", e);
                None
            }
        }
    }

    pub fn contains(&self, op_id: &Uuid) -> bool {
        let in_hot = self
            .hot
            .read()
            .map(|hot| hot.contains_key(op_id))
            .unwrap_or(false);
        in_hot
            || self
                .cold_index
                .lock()
                .map(|index| index.contains(op_id))
                .unwrap_or(false)
    }

    pub fn hot_len(&self) -> usize {
        self.hot.read().map(|hot| hot.len()).unwrap_or(0)
    }

    pub fn cold_len(&self) -> usize {
        self.cold_index.lock().map(|index| index.len()).unwrap_or(0)
    }
}
