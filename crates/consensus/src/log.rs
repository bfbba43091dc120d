// Path: crates/consensus/src/log.rs

//! Replicated-log DECIDE backend.
//!
//! Proposals append to a sequential log keyed by need id; the first entry
//! for a need wins, and replaying the log on open reproduces the same
//! winners. A multi-replica deployment points this at its consensus log;
//! the single-replica degenerate case preserves the identical contract.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use swarm_api::DecideCoordinator;
use swarm_types::committee::DecideRecord;
use swarm_types::error::DecideError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct LogState {
    writer: BufWriter<File>,
    /// First-wins index rebuilt from the log on open.
    decided: HashMap<String, DecideRecord>,
}

pub struct LogCoordinator {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl LogCoordinator {
    pub fn open(path: &Path) -> Result<Self, DecideError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DecideError::Backend(e.to_string()))?;
        }

        let mut decided = HashMap::new();
        if path.exists() {
            let file = File::open(path).map_err(|e| DecideError::Backend(e.to_string()))?;
            for (idx, line) in BufReader::new(file).lines().enumerate() {
                let line = line.map_err(|e| DecideError::Backend(e.to_string()))?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<DecideRecord>(&line) {
                    // Idempotent replay: only the first proposal per need
                    // takes effect.
                    Ok(record) => {
                        decided.entry(record.need_id.clone()).or_insert(record);
                    }
                    Err(e) => {
                        warn!(target: "consensus", line = idx, "skipping unreadable log entry: {}", e)
                    }
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| DecideError::Backend(e.to_string()))?;

        debug!(target: "consensus", decided = decided.len(), "decide log recovered");
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(LogState {
                writer: BufWriter::new(file),
                decided,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DecideCoordinator for LogCoordinator {
    async fn try_decide(&self, record: DecideRecord) -> Result<Option<DecideRecord>, DecideError> {
        let mut state = self.state.lock().await;
        if state.decided.contains_key(&record.need_id) {
            debug!(target: "consensus", need = %record.need_id, "decide conflict (log)");
            return Ok(None);
        }
        let line =
            serde_json::to_string(&record).map_err(|e| DecideError::Backend(e.to_string()))?;
        state
            .writer
            .write_all(line.as_bytes())
            .map_err(|e| DecideError::Backend(e.to_string()))?;
        state
            .writer
            .write_all(b"\n")
            .map_err(|e| DecideError::Backend(e.to_string()))?;
        state
            .writer
            .flush()
            .map_err(|e| DecideError::Backend(e.to_string()))?;
        info!(
            target: "consensus",
            need = %record.need_id,
            proposal = %record.proposal_id,
            "decide appended to log"
        );
        state
            .decided
            .insert(record.need_id.clone(), record.clone());
        Ok(Some(record))
    }

    async fn get_decision(&self, need_id: &str) -> Result<Option<DecideRecord>, DecideError> {
        Ok(self.state.lock().await.decided.get(need_id).cloned())
    }
}
