// Path: crates/plan/src/wal.rs
//! Write-ahead log for op-log persistence.
//!
//! `append` returns as soon as the op is written to a sequential JSON-lines
//! file; the in-memory indexes are rebuilt from the log on open.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use swarm_types::error::PlanError;
use swarm_types::plan::PlanOp;
use tracing::warn;

pub struct OpWal {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
}

impl OpWal {
    pub fn open(path: &Path) -> Result<Self, PlanError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one op as a JSON line and flush.
    pub fn append(&self, op: &PlanOp) -> Result<(), PlanError> {
        let line = serde_json::to_string(op).map_err(|e| PlanError::Serialization(e.to_string()))?;
        let mut writer = self.file.lock().map_err(|_| PlanError::LockPoisoned)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Replay every op recorded in the log. Truncated or corrupt trailing
    /// lines are skipped with a warning so a crash mid-append does not
    /// poison recovery.
    pub fn replay(&self) -> Result<Vec<PlanOp>, PlanError> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut ops = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PlanOp>(&line) {
                Ok(op) => ops.push(op),
                Err(e) => {
                    warn!(target: "plan", line = idx, "skipping unreadable WAL entry: {}", e);
                }
            }
        }
        Ok(ops)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use swarm_types::plan::OpType;
    use uuid::Uuid;

    fn probe_op(lamport: u64) -> PlanOp {
        PlanOp {
            op_id: Uuid::new_v4(),
            thread_id: "t1".into(),
            lamport,
            actor_id: "aa".into(),
            op_type: OpType::Annotate,
            task_id: "task-1".into(),
            payload: json!({"annotation_type": "probe"}),
            timestamp_ns: 1,
            epoch: 0,
        }
    }

    #[test]
    fn test_append_replay_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oplog.jsonl");
        let wal = OpWal::open(&path).unwrap();
        let ops = vec![probe_op(1), probe_op(2), probe_op(3)];
        for op in &ops {
            wal.append(op).unwrap();
        }
        drop(wal);

        let reopened = OpWal::open(&path).unwrap();
        assert_eq!(reopened.replay().unwrap(), ops);
    }

    #[test]
    fn test_replay_skips_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oplog.jsonl");
        let wal = OpWal::open(&path).unwrap();
        wal.append(&probe_op(1)).unwrap();
        drop(wal);

        // Simulate a crash mid-append.
        use std::io::Write as _;
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"op_id\": \"truncat").unwrap();
        drop(f);

        let reopened = OpWal::open(&path).unwrap();
        assert_eq!(reopened.replay().unwrap().len(), 1);
    }
}
