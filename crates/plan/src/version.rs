// Path: crates/plan/src/version.rs

//! Plan version tracking.
//!
//! Every successful UPDATE_PLAN apply records a version: a Merkle
//! commitment over the derived state of the tasks the patch touched, so
//! divergent replicas can be pinpointed without shipping state around.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use swarm_crypto::hash::{sha256, sha256_pair};
use swarm_types::codec;
use swarm_types::plan::TaskView;
use swarm_types::time::now_ns;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanVersion {
    pub version_id: u64,
    pub lamport: u64,
    /// Hex-encoded Merkle root over the touched tasks' derived state.
    pub merkle_root: String,
    pub timestamp_ns: u64,
    pub metadata: Value,
}

#[derive(Default)]
pub struct VersionTracker {
    versions: Mutex<Vec<PlanVersion>>,
}

impl VersionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a version over the given task views (keyed by task id).
    pub fn record_version(
        &self,
        plan_state: &BTreeMap<String, TaskView>,
        lamport: u64,
        metadata: Value,
    ) -> Result<PlanVersion, String> {
        let mut leaves = Vec::with_capacity(plan_state.len());
        for (task_id, view) in plan_state {
            let bytes = codec::to_bytes_canonical(&(task_id, view))?;
            leaves.push(sha256(&bytes));
        }
        let version = {
            let mut versions = self.versions.lock().map_err(|_| "version lock poisoned")?;
            let version = PlanVersion {
                version_id: versions.len() as u64 + 1,
                lamport,
                merkle_root: hex::encode(fold_root(leaves)),
                timestamp_ns: now_ns(),
                metadata,
            };
            versions.push(version.clone());
            version
        };
        debug!(
            target: "plan",
            version = version.version_id,
            lamport,
            root = %version.merkle_root,
            "recorded plan version"
        );
        Ok(version)
    }

    pub fn latest(&self) -> Option<PlanVersion> {
        self.versions.lock().ok()?.last().cloned()
    }

    pub fn get(&self, version_id: u64) -> Option<PlanVersion> {
        self.versions
            .lock()
            .ok()?
            .iter()
            .find(|v| v.version_id == version_id)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.versions.lock().map(|v| v.len()).unwrap_or(0)
    }
}

/// Binary fold with odd-node duplication; empty input hashes the empty
/// string, matching the checkpoint tree's convention.
fn fold_root(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    if level.is_empty() {
        return sha256(b"");
    }
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let right = pair.get(1).unwrap_or(&pair[0]);
            next.push(sha256_pair(&pair[0], right));
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use swarm_types::plan::TaskState;

    fn state_with(task_id: &str, state: TaskState) -> BTreeMap<String, TaskView> {
        let mut view = TaskView::new(task_id.to_string());
        view.state = state;
        let mut map = BTreeMap::new();
        map.insert(task_id.to_string(), view);
        map
    }

    #[test]
    fn test_versions_increment_and_commit_to_state() {
        let tracker = VersionTracker::new();
        let v1 = tracker
            .record_version(&state_with("x", TaskState::Draft), 5, json!({}))
            .unwrap();
        let v2 = tracker
            .record_version(&state_with("x", TaskState::Decided), 6, json!({}))
            .unwrap();
        assert_eq!(v1.version_id, 1);
        assert_eq!(v2.version_id, 2);
        assert_ne!(v1.merkle_root, v2.merkle_root);
        assert_eq!(tracker.latest().unwrap(), v2);
    }

    #[test]
    fn test_same_state_same_root() {
        let tracker = VersionTracker::new();
        let a = tracker
            .record_version(&state_with("x", TaskState::Final), 1, json!({}))
            .unwrap();
        let b = tracker
            .record_version(&state_with("x", TaskState::Final), 2, json!({}))
            .unwrap();
        assert_eq!(a.merkle_root, b.merkle_root);
    }
}
