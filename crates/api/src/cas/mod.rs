// Path: crates/api/src/cas/mod.rs
//! Content-addressable storage contract and a local blob-store backend.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Mutex;
use swarm_types::error::CasError;
use tracing::{debug, warn};

/// The storage contract COMMIT and artifact resolution consume.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store bytes; returns the content id.
    async fn put(&self, bytes: &[u8]) -> Result<String, CasError>;

    /// Fetch bytes by content id.
    async fn get(&self, cid: &str) -> Result<Vec<u8>, CasError>;

    /// Existence check without fetching.
    async fn has(&self, cid: &str) -> bool;

    /// Pin a cid so garbage collection keeps it. Pinning requires an
    /// explicit call; nothing is pinned by default.
    async fn pin(&self, cid: &str) -> Result<(), CasError>;

    async fn unpin(&self, cid: &str) -> Result<(), CasError>;

    async fn list_pins(&self) -> Vec<String>;

    /// Drop unpinned content; returns the number of blobs removed.
    async fn gc(&self) -> Result<usize, CasError>;
}

/// Filesystem blob store addressed by SHA-256, sharded by the first two
/// hex characters like the cold op archive.
pub struct LocalBlobStore {
    root: PathBuf,
    pins: Mutex<BTreeSet<String>>,
}

impl LocalBlobStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CasError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            pins: Mutex::new(BTreeSet::new()),
        })
    }

    fn blob_path(&self, cid: &str) -> PathBuf {
        let shard = if cid.len() >= 2 { &cid[..2] } else { "00" };
        self.root.join(shard).join(cid)
    }

    fn pins_locked(&self) -> BTreeSet<String> {
        match self.pins.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ContentStore for LocalBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<String, CasError> {
        let cid = hex::encode(Sha256::digest(bytes));
        let path = self.blob_path(&cid);
        if path.exists() {
            return Ok(cid);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        debug!(target: "cas", cid = %cid, size = bytes.len(), "stored blob");
        Ok(cid)
    }

    async fn get(&self, cid: &str) -> Result<Vec<u8>, CasError> {
        let path = self.blob_path(cid);
        if !path.exists() {
            return Err(CasError::NotFound(cid.to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    async fn has(&self, cid: &str) -> bool {
        self.blob_path(cid).exists()
    }

    async fn pin(&self, cid: &str) -> Result<(), CasError> {
        if !self.blob_path(cid).exists() {
            return Err(CasError::NotFound(cid.to_string()));
        }
        if let Ok(mut pins) = self.pins.lock() {
            pins.insert(cid.to_string());
        }
        Ok(())
    }

    async fn unpin(&self, cid: &str) -> Result<(), CasError> {
        if let Ok(mut pins) = self.pins.lock() {
            pins.remove(cid);
        }
        Ok(())
    }

    async fn list_pins(&self) -> Vec<String> {
        self.pins_locked().into_iter().collect()
    }

    async fn gc(&self) -> Result<usize, CasError> {
        let pins = self.pins_locked();
        let mut removed = 0usize;
        for shard in std::fs::read_dir(&self.root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(shard.path())? {
                let entry = entry?;
                let cid = entry.file_name().to_string_lossy().to_string();
                if pins.contains(&cid) {
                    continue;
                }
                if let Err(e) = std::fs::remove_file(entry.path()) {
                    warn!(target: "cas", cid = %cid, "gc failed to remove blob: {}", e);
                    continue;
                }
                removed += 1;
            }
        }
        debug!(target: "cas", removed, "gc complete");
        Ok(removed)
    }
}
