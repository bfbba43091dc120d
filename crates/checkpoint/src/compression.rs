// Path: crates/checkpoint/src/compression.rs

//! Deterministic zstd compression for checkpoint state.
//!
//! Input is always canonical JSON (sorted keys, minimal separators), so
//! identical logical state compresses to identical bytes. Frames carry
//! the content size and a checksum.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use swarm_crypto::hash::sha256_hex;
use swarm_types::codec;
use swarm_types::error::CheckpointError;
use swarm_types::plan::PlanOp;
use tracing::debug;

pub struct DeterministicCompressor {
    level: i32,
}

/// Compressed thread-ops bundle with enough metadata to sanity-check the
/// expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsSummary {
    pub op_count: usize,
    pub thread_id: Option<String>,
    pub first_lamport: u64,
    pub last_lamport: u64,
    /// Hex-encoded zstd frame.
    pub compressed_ops: String,
    pub compressed_size: usize,
    pub original_size: usize,
    /// SHA-256 of the canonical op bytes before compression.
    pub original_hash: String,
}

impl DeterministicCompressor {
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    fn compress_bytes(&self, data: &[u8]) -> Result<Vec<u8>, CheckpointError> {
        let mut encoder = zstd::stream::Encoder::new(Vec::new(), self.level)
            .map_err(|e| CheckpointError::Compression(e.to_string()))?;
        encoder
            .include_checksum(true)
            .map_err(|e| CheckpointError::Compression(e.to_string()))?;
        encoder
            .include_contentsize(true)
            .map_err(|e| CheckpointError::Compression(e.to_string()))?;
        std::io::Write::write_all(&mut encoder, data)
            .map_err(|e| CheckpointError::Compression(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CheckpointError::Compression(e.to_string()))
    }

    fn decompress_bytes(&self, data: &[u8]) -> Result<Vec<u8>, CheckpointError> {
        zstd::stream::decode_all(data).map_err(|e| CheckpointError::Compression(e.to_string()))
    }

    /// Compress a state summary to a zstd frame over its canonical bytes.
    pub fn compress_state(&self, state: &Value) -> Result<Vec<u8>, CheckpointError> {
        let canonical =
            codec::to_bytes_canonical(state).map_err(CheckpointError::Serialization)?;
        let compressed = self.compress_bytes(&canonical)?;
        debug!(
            target: "checkpoint",
            original = canonical.len(),
            compressed = compressed.len(),
            "compressed state"
        );
        Ok(compressed)
    }

    /// Reverse `compress_state`.
    pub fn decompress_state(&self, data: &[u8]) -> Result<Value, CheckpointError> {
        let bytes = self.decompress_bytes(data)?;
        serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Serialization(e.to_string()))
    }

    /// Compress a run of thread ops into a verifiable summary.
    pub fn compress_ops(&self, ops: &[PlanOp]) -> Result<OpsSummary, CheckpointError> {
        let canonical = codec::to_bytes_canonical(&ops).map_err(CheckpointError::Serialization)?;
        let compressed = self.compress_bytes(&canonical)?;
        Ok(OpsSummary {
            op_count: ops.len(),
            thread_id: ops.first().map(|op| op.thread_id.clone()),
            first_lamport: ops.first().map(|op| op.lamport).unwrap_or(0),
            last_lamport: ops.last().map(|op| op.lamport).unwrap_or(0),
            compressed_size: compressed.len(),
            original_size: canonical.len(),
            original_hash: sha256_hex(&canonical),
            compressed_ops: hex::encode(compressed),
        })
    }

    /// Expand a summary back into ops, checking the recorded hash.
    pub fn decompress_ops(&self, summary: &OpsSummary) -> Result<Vec<PlanOp>, CheckpointError> {
        let compressed = hex::decode(&summary.compressed_ops)
            .map_err(|e| CheckpointError::Compression(e.to_string()))?;
        let bytes = self.decompress_bytes(&compressed)?;
        if sha256_hex(&bytes) != summary.original_hash {
            return Err(CheckpointError::Compression(
                "decompressed ops do not match recorded hash".to_string(),
            ));
        }
        serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Serialization(e.to_string()))
    }
}

impl Default for DeterministicCompressor {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use swarm_types::plan::OpType;
    use uuid::Uuid;

    #[test]
    fn test_state_roundtrip() {
        let compressor = DeterministicCompressor::default();
        let state = json!({
            "task-1": {"state": "FINAL", "annotations": [{"annotation_type": "commit"}]},
            "task-2": {"state": "DRAFT", "annotations": []},
        });
        let compressed = compressor.compress_state(&state).unwrap();
        let restored = compressor.decompress_state(&compressed).unwrap();
        assert_eq!(state, restored);
    }

    #[test]
    fn test_compression_is_deterministic() {
        let compressor = DeterministicCompressor::default();
        // Key order differs; canonical form does not.
        let a = json!({"b": 2, "a": 1});
        let b = json!({"a": 1, "b": 2});
        assert_eq!(
            compressor.compress_state(&a).unwrap(),
            compressor.compress_state(&b).unwrap()
        );
    }

    #[test]
    fn test_ops_summary_roundtrip_and_integrity() {
        let compressor = DeterministicCompressor::default();
        let ops: Vec<PlanOp> = (1..=20)
            .map(|l| PlanOp {
                op_id: Uuid::from_u128(l as u128),
                thread_id: "t1".into(),
                lamport: l,
                actor_id: "aa".into(),
                op_type: OpType::Annotate,
                task_id: "x".into(),
                payload: json!({"n": l}),
                timestamp_ns: l,
                epoch: 1,
            })
            .collect();

        let summary = compressor.compress_ops(&ops).unwrap();
        assert_eq!(summary.op_count, 20);
        assert_eq!(summary.first_lamport, 1);
        assert_eq!(summary.last_lamport, 20);

        let restored = compressor.decompress_ops(&summary).unwrap();
        assert_eq!(restored, ops);

        // Corrupt the recorded hash: expansion must refuse.
        let mut bad = summary.clone();
        bad.original_hash = "00".repeat(32);
        assert!(matches!(
            compressor.decompress_ops(&bad),
            Err(CheckpointError::Compression(_))
        ));
    }

    #[test]
    fn test_garbage_input_is_an_error_not_a_panic() {
        let compressor = DeterministicCompressor::default();
        assert!(compressor.decompress_state(b"not a zstd frame").is_err());
    }
}
