// Path: crates/checkpoint/src/manager.rs

//! Checkpoint lifecycle: create on epoch boundaries, gather signatures,
//! persist, and load with transparent decompression.

use crate::compression::DeterministicCompressor;
use crate::merkle::MerkleTree;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use swarm_types::checkpoint::{Checkpoint, CheckpointSignature, SignedCheckpoint};
use swarm_types::config::CheckpointConfig;
use swarm_types::error::CheckpointError;
use swarm_types::time::now_ns;
use tracing::{info, warn};

/// Marker keys flagging a compressed `state_summary` on disk.
const COMPRESSED_MARKER: &str = "_compressed";
const COMPRESSED_DATA: &str = "_data";

pub struct CheckpointManager {
    dir: PathBuf,
    config: CheckpointConfig,
    compressor: Option<DeterministicCompressor>,
    cache: Mutex<HashMap<u64, SignedCheckpoint>>,
}

impl CheckpointManager {
    pub fn open(dir: &Path, config: CheckpointConfig) -> Result<Self, CheckpointError> {
        std::fs::create_dir_all(dir)?;
        let compressor = config
            .enable_compression
            .then(|| DeterministicCompressor::new(config.compression_level));
        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            compressor,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    fn path_for(&self, epoch: u64) -> PathBuf {
        self.dir.join(format!("checkpoint_epoch_{}.json", epoch))
    }

    /// Seal an epoch: Merkle-commit the op hashes and wrap the state
    /// summary.
    pub fn create_checkpoint(
        &self,
        epoch: u64,
        state_summary: Value,
        op_hashes: &[String],
        lamport: u64,
        policy_hash: &str,
    ) -> Result<Checkpoint, CheckpointError> {
        let mut leaves = Vec::with_capacity(op_hashes.len());
        for h in op_hashes {
            let raw = hex::decode(h)
                .map_err(|e| CheckpointError::Serialization(format!("bad op hash: {}", e)))?;
            let leaf: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
                CheckpointError::Serialization("op hash is not 32 bytes".to_string())
            })?;
            leaves.push(leaf);
        }
        let mut tree = MerkleTree::new();
        let root = tree.build(leaves);

        let checkpoint = Checkpoint {
            epoch,
            merkle_root: hex::encode(root),
            state_summary,
            timestamp_ns: now_ns(),
            op_count: op_hashes.len() as u64,
            lamport,
            policy_hash: policy_hash.to_string(),
            metadata: json!({}),
        };
        info!(
            target: "checkpoint",
            epoch,
            ops = op_hashes.len(),
            root = %checkpoint.merkle_root,
            "created checkpoint"
        );
        Ok(checkpoint)
    }

    /// Attach gathered verifier signatures; fails below the configured
    /// quorum.
    pub fn sign_checkpoint(
        &self,
        checkpoint: Checkpoint,
        signatures: Vec<CheckpointSignature>,
    ) -> Result<SignedCheckpoint, CheckpointError> {
        if signatures.len() < self.config.signature_quorum {
            return Err(CheckpointError::QuorumNotMet {
                got: signatures.len(),
                required: self.config.signature_quorum,
            });
        }
        Ok(SignedCheckpoint {
            checkpoint,
            signatures,
        })
    }

    /// Persist to `checkpoint_epoch_<N>.json`, compressing the state
    /// summary when enabled, and cache in memory.
    pub fn store(&self, signed: &SignedCheckpoint) -> Result<PathBuf, CheckpointError> {
        let epoch = signed.checkpoint.epoch;
        let path = self.path_for(epoch);

        let mut on_disk = signed.clone();
        if let Some(compressor) = &self.compressor {
            let compressed = compressor.compress_state(&signed.checkpoint.state_summary)?;
            on_disk.checkpoint.state_summary = json!({
                COMPRESSED_MARKER: true,
                COMPRESSED_DATA: hex::encode(compressed),
            });
        }

        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, &on_disk)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(epoch, signed.clone());
        }
        info!(target: "checkpoint", epoch, path = %path.display(), "stored checkpoint");
        Ok(path)
    }

    /// Load from disk, reversing compression if the marker keys are
    /// present.
    pub fn load(&self, path: &Path) -> Result<SignedCheckpoint, CheckpointError> {
        let bytes = std::fs::read(path)?;
        let mut signed: SignedCheckpoint = serde_json::from_slice(&bytes)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;

        let is_compressed = signed
            .checkpoint
            .state_summary
            .get(COMPRESSED_MARKER)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if is_compressed {
            let data = signed
                .checkpoint
                .state_summary
                .get(COMPRESSED_DATA)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    CheckpointError::Serialization("compressed checkpoint missing _data".into())
                })?;
            let raw = hex::decode(data)
                .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
            // A checkpoint written compressed must stay loadable even if
            // this node has since disabled compression.
            signed.checkpoint.state_summary = match &self.compressor {
                Some(compressor) => compressor.decompress_state(&raw)?,
                None => DeterministicCompressor::default().decompress_state(&raw)?,
            };
        }

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(signed.checkpoint.epoch, signed.clone());
        }
        Ok(signed)
    }

    /// Checkpoint for an epoch, from cache or disk.
    pub fn get(&self, epoch: u64) -> Result<SignedCheckpoint, CheckpointError> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(signed) = cache.get(&epoch) {
                return Ok(signed.clone());
            }
        }
        let path = self.path_for(epoch);
        if !path.exists() {
            return Err(CheckpointError::NotFound(epoch));
        }
        self.load(&path)
    }

    /// Most recent checkpoint on disk, by filename epoch.
    pub fn latest(&self) -> Result<Option<SignedCheckpoint>, CheckpointError> {
        match self.list()?.last() {
            Some(&epoch) => self.get(epoch).map(Some),
            None => Ok(None),
        }
    }

    /// Available checkpoint epochs, ascending.
    pub fn list(&self) -> Result<Vec<u64>, CheckpointError> {
        let mut epochs = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let epoch = name
                .strip_prefix("checkpoint_epoch_")
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|num| num.parse::<u64>().ok());
            match epoch {
                Some(epoch) => epochs.push(epoch),
                None => {
                    if name.starts_with("checkpoint_epoch_") {
                        warn!(target: "checkpoint", file = %name, "ignoring malformed checkpoint filename");
                    }
                }
            }
        }
        epochs.sort_unstable();
        Ok(epochs)
    }

    pub fn delete(&self, epoch: u64) -> Result<bool, CheckpointError> {
        let path = self.path_for(epoch);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(&epoch);
        }
        info!(target: "checkpoint", epoch, "deleted checkpoint");
        Ok(true)
    }

    /// Drop the in-memory cache (tests use this to prove disk roundtrips).
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_crypto::hash::sha256_hex;

    fn manager(dir: &Path) -> CheckpointManager {
        CheckpointManager::open(dir, CheckpointConfig::default()).unwrap()
    }

    fn op_hashes(n: usize) -> Vec<String> {
        (0..n).map(|i| sha256_hex(format!("op-{}", i).as_bytes())).collect()
    }

    #[test]
    fn test_store_load_roundtrip_with_compression() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        let state = json!({"t1": {"state": "FINAL"}, "t2": {"state": "DRAFT"}});
        let checkpoint = mgr
            .create_checkpoint(4, state.clone(), &op_hashes(800), 800, "ph")
            .unwrap();
        let expected_root = checkpoint.merkle_root.clone();
        let signed = mgr
            .sign_checkpoint(
                checkpoint,
                vec![CheckpointSignature {
                    verifier_id: "did:swarm:v1".into(),
                    signature: "sig".into(),
                }],
            )
            .unwrap();
        let path = mgr.store(&signed).unwrap();
        assert!(path.ends_with("checkpoint_epoch_4.json"));

        // Drop cache so the load really comes from disk.
        mgr.clear_cache();
        let loaded = mgr.get(4).unwrap();
        assert_eq!(loaded.checkpoint.state_summary, state);
        assert_eq!(loaded.checkpoint.merkle_root, expected_root);
        assert_eq!(loaded.checkpoint.op_count, 800);

        // On-disk form is compressed.
        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["checkpoint"]["state_summary"]["_compressed"], true);
    }

    #[test]
    fn test_merkle_root_matches_recomputation() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let hashes = op_hashes(10);

        let checkpoint = mgr
            .create_checkpoint(1, json!({}), &hashes, 10, "ph")
            .unwrap();

        let mut tree = MerkleTree::new();
        let leaves: Vec<[u8; 32]> = hashes
            .iter()
            .map(|h| hex::decode(h).unwrap().try_into().unwrap())
            .collect();
        assert_eq!(checkpoint.merkle_root, hex::encode(tree.build(leaves)));
    }

    #[test]
    fn test_signature_quorum_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CheckpointConfig::default();
        config.signature_quorum = 2;
        let mgr = CheckpointManager::open(dir.path(), config).unwrap();
        let checkpoint = mgr.create_checkpoint(1, json!({}), &[], 0, "ph").unwrap();
        assert!(matches!(
            mgr.sign_checkpoint(
                checkpoint,
                vec![CheckpointSignature {
                    verifier_id: "v1".into(),
                    signature: "s".into()
                }]
            ),
            Err(CheckpointError::QuorumNotMet { got: 1, required: 2 })
        ));
    }

    #[test]
    fn test_latest_and_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        for epoch in [1u64, 3, 2] {
            let cp = mgr
                .create_checkpoint(epoch, json!({}), &op_hashes(2), epoch, "ph")
                .unwrap();
            let signed = mgr
                .sign_checkpoint(
                    cp,
                    vec![CheckpointSignature {
                        verifier_id: "v1".into(),
                        signature: "s".into(),
                    }],
                )
                .unwrap();
            mgr.store(&signed).unwrap();
        }
        assert_eq!(mgr.list().unwrap(), vec![1, 2, 3]);
        assert_eq!(mgr.latest().unwrap().unwrap().checkpoint.epoch, 3);

        assert!(mgr.delete(3).unwrap());
        assert!(!mgr.delete(3).unwrap());
        assert_eq!(mgr.latest().unwrap().unwrap().checkpoint.epoch, 2);
        assert!(matches!(mgr.get(3), Err(CheckpointError::NotFound(3))));
    }
}
