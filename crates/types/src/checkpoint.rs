// Path: crates/types/src/checkpoint.rs

//! Checkpoint structures: Merkle-rooted epoch snapshots and their
//! verifier signatures.

use crate::codec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An epoch checkpoint committing to the ops of that epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: u64,
    /// Hex-encoded Merkle root over the epoch's op hashes.
    pub merkle_root: String,
    /// Snapshot of derived plan state; may be stored compressed on disk.
    pub state_summary: Value,
    pub timestamp_ns: u64,
    pub op_count: u64,
    /// Highest Lamport value covered by this checkpoint.
    #[serde(default)]
    pub lamport: u64,
    /// Policy ruleset hash in force when the checkpoint was sealed, so
    /// receivers can detect rule drift.
    #[serde(default)]
    pub policy_hash: String,
    #[serde(default)]
    pub metadata: Value,
}

impl Checkpoint {
    /// Deterministic hash over the canonical identifying fields.
    pub fn compute_hash(&self) -> Result<String, String> {
        let canonical = json!({
            "epoch": self.epoch,
            "merkle_root": self.merkle_root,
            "op_count": self.op_count,
            "timestamp_ns": self.timestamp_ns,
            "state_summary": self.state_summary,
        });
        codec::hash_canonical(&canonical)
    }
}

/// A single verifier signature over a checkpoint hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSignature {
    pub verifier_id: String,
    /// Hex-encoded signature over `Checkpoint::compute_hash()`.
    pub signature: String,
}

/// A checkpoint plus the verifier signatures gathered for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedCheckpoint {
    pub checkpoint: Checkpoint,
    #[serde(default)]
    pub signatures: Vec<CheckpointSignature>,
}

impl SignedCheckpoint {
    pub fn add_signature(&mut self, verifier_id: impl Into<String>, signature: impl Into<String>) {
        self.signatures.push(CheckpointSignature {
            verifier_id: verifier_id.into(),
            signature: signature.into(),
        });
    }

    /// True if at least `required` signatures are attached.
    pub fn has_quorum(&self, required: usize) -> bool {
        self.signatures.len() >= required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_hash_ignores_signatures_and_metadata() {
        let cp = Checkpoint {
            epoch: 4,
            merkle_root: "ab".into(),
            state_summary: json!({"t1": {"state": "FINAL"}}),
            timestamp_ns: 9,
            op_count: 800,
            lamport: 800,
            policy_hash: "ph".into(),
            metadata: json!({}),
        };
        let h = cp.compute_hash().unwrap();

        let mut altered = cp.clone();
        altered.metadata = json!({"note": "x"});
        assert_eq!(h, altered.compute_hash().unwrap());

        altered.op_count = 801;
        assert_ne!(h, altered.compute_hash().unwrap());
    }

    #[test]
    fn test_signature_quorum() {
        let mut signed = SignedCheckpoint {
            checkpoint: Checkpoint {
                epoch: 1,
                merkle_root: String::new(),
                state_summary: json!({}),
                timestamp_ns: 0,
                op_count: 0,
                lamport: 0,
                policy_hash: String::new(),
                metadata: json!({}),
            },
            signatures: vec![],
        };
        assert!(!signed.has_quorum(1));
        signed.add_signature("did:swarm:v1", "sig");
        assert!(signed.has_quorum(1));
        assert!(!signed.has_quorum(2));
    }
}
