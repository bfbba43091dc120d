// Path: crates/types/src/plan.rs

//! Plan-store operation types and derived task state.

use crate::codec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Operation kinds recorded in the append-only op-log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpType {
    AddTask,
    State,
    Link,
    Annotate,
}

impl OpType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADD_TASK" => Some(Self::AddTask),
            "STATE" => Some(Self::State),
            "LINK" => Some(Self::Link),
            "ANNOTATE" => Some(Self::Annotate),
            _ => None,
        }
    }
}

/// Task lifecycle states derived from STATE ops.
///
/// The log does not enforce transitions; consumers derive the current
/// state by scanning STATE ops in total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Draft,
    Decided,
    Claimed,
    Committed,
    Final,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Decided => "DECIDED",
            Self::Claimed => "CLAIMED",
            Self::Committed => "COMMITTED",
            Self::Final => "FINAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "DECIDED" => Some(Self::Decided),
            "CLAIMED" => Some(Self::Claimed),
            "COMMITTED" => Some(Self::Committed),
            "FINAL" => Some(Self::Final),
            _ => None,
        }
    }
}

/// A single entry in the append-only operation log.
///
/// The op-log exclusively owns its ops; readers get copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOp {
    pub op_id: Uuid,
    pub thread_id: String,
    pub lamport: u64,
    /// Hex-encoded sender public key.
    pub actor_id: String,
    pub op_type: OpType,
    pub task_id: String,
    pub payload: Value,
    pub timestamp_ns: u64,
    /// Epoch the op was appended in; stamped by the plan store and used by
    /// pruning and fast-sync continuity checks.
    #[serde(default)]
    pub epoch: u64,
}

impl PlanOp {
    /// SHA-256 over the canonical serialization, hex-encoded. Merkle leaves
    /// and range hashes are built from this.
    pub fn hash(&self) -> Result<String, String> {
        codec::hash_canonical(self)
    }

    /// Total-order key: Lamport ascending, op_id lexicographic tiebreak.
    pub fn order_key(&self) -> (u64, Uuid) {
        (self.lamport, self.op_id)
    }
}

/// Derived view of a task: latest STATE plus accumulated annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    pub task_id: String,
    pub state: TaskState,
    /// Payload of the ADD_TASK op that created the task, if seen.
    pub spec: Option<Value>,
    /// ANNOTATE payloads in total order.
    pub annotations: Vec<Value>,
    /// (parent, child) edges from LINK ops.
    pub links: Vec<(String, String)>,
}

impl TaskView {
    pub fn new(task_id: String) -> Self {
        Self {
            task_id,
            state: TaskState::Draft,
            spec: None,
            annotations: Vec::new(),
            links: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_op_type_wire_names() {
        assert_eq!(serde_json::to_string(&OpType::AddTask).unwrap(), "\"ADD_TASK\"");
        assert_eq!(OpType::parse("STATE"), Some(OpType::State));
        assert_eq!(OpType::parse("BOGUS"), None);
    }

    #[test]
    fn test_op_hash_changes_with_payload() {
        let mut op = PlanOp {
            op_id: Uuid::new_v4(),
            thread_id: "t1".into(),
            lamport: 3,
            actor_id: "aa".into(),
            op_type: OpType::Annotate,
            task_id: "task".into(),
            payload: json!({"annotation_type": "proposal"}),
            timestamp_ns: 1,
            epoch: 0,
        };
        let h1 = op.hash().unwrap();
        op.payload = json!({"annotation_type": "attestation"});
        assert_ne!(h1, op.hash().unwrap());
    }
}
