// Path: crates/consensus/src/kv.rs

//! Compare-and-set DECIDE backend over a key-value layout.
//!
//! Key `decide/<need_id>` goes absent → present exactly once. In-process
//! callers race on a mutex; across processes sharing the state directory,
//! exclusive file creation (`O_EXCL`) is the linearization point.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use swarm_api::DecideCoordinator;
use swarm_types::committee::DecideRecord;
use swarm_types::error::DecideError;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct KvCasCoordinator {
    dir: PathBuf,
    cache: Mutex<HashMap<String, DecideRecord>>,
}

impl KvCasCoordinator {
    pub fn open(dir: &std::path::Path) -> Result<Self, DecideError> {
        std::fs::create_dir_all(dir).map_err(|e| DecideError::Backend(e.to_string()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn key_path(&self, need_id: &str) -> PathBuf {
        // Need ids are free-form; key by their hash to stay path-safe.
        let key = hex::encode(Sha256::digest(need_id.as_bytes()));
        self.dir.join(format!("{}.json", key))
    }

    fn read_record(&self, need_id: &str) -> Result<Option<DecideRecord>, DecideError> {
        let path = self.key_path(need_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|e| DecideError::Backend(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| DecideError::Backend(format!("corrupt decide record: {}", e)))
    }
}

#[async_trait]
impl DecideCoordinator for KvCasCoordinator {
    async fn try_decide(&self, record: DecideRecord) -> Result<Option<DecideRecord>, DecideError> {
        let mut cache = self.cache.lock().await;
        if cache.contains_key(&record.need_id) {
            debug!(target: "consensus", need = %record.need_id, "decide conflict (cached)");
            return Ok(None);
        }

        let path = self.key_path(&record.need_id);
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| DecideError::Backend(e.to_string()))?;

        // create_new is the CAS: exactly one creator succeeds.
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                use std::io::Write;
                file.write_all(&bytes)
                    .map_err(|e| DecideError::Backend(e.to_string()))?;
                file.sync_all()
                    .map_err(|e| DecideError::Backend(e.to_string()))?;
                info!(
                    target: "consensus",
                    need = %record.need_id,
                    proposal = %record.proposal_id,
                    "decide registered"
                );
                cache.insert(record.need_id.clone(), record.clone());
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // Someone else won; cache their record for fast reads.
                if let Some(winner) = self.read_record(&record.need_id)? {
                    cache.insert(record.need_id.clone(), winner);
                }
                debug!(target: "consensus", need = %record.need_id, "decide conflict");
                Ok(None)
            }
            Err(e) => Err(DecideError::Backend(e.to_string())),
        }
    }

    async fn get_decision(&self, need_id: &str) -> Result<Option<DecideRecord>, DecideError> {
        {
            let cache = self.cache.lock().await;
            if let Some(record) = cache.get(need_id) {
                return Ok(Some(record.clone()));
            }
        }
        self.read_record(need_id)
    }
}
