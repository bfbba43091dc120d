// Path: crates/types/src/config/mod.rs

//! Node and subsystem configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which backend the atomic DECIDE adapter uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecideBackend {
    /// Compare-and-set on a strongly-consistent key-value store.
    Cas,
    /// Replicated-log backend with idempotent proposals keyed by need id.
    Raft,
}

impl std::str::FromStr for DecideBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cas" => Ok(Self::Cas),
            "raft" => Ok(Self::Raft),
            other => Err(format!("unknown decide backend '{}'", other)),
        }
    }
}

/// Quorum and bootstrap parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumConfig {
    /// Active-verifier count below which the swarm is in bootstrap mode.
    pub bootstrap_threshold: usize,
    /// Hours continuously above the threshold before bootstrap exits.
    pub bootstrap_stable_hours: u64,
    /// Target K after bootstrap.
    pub k_target: usize,
    /// Fraction of active verifiers required for quorum.
    pub alpha: f64,
    /// Minimum stake for a verifier to count as active.
    pub min_stake: u64,
    /// Threshold for the worker-commit ATTEST path. Configurable, never
    /// hardcoded; ATTEST_PLAN computes its K dynamically instead.
    pub attest_threshold: usize,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            bootstrap_threshold: 10,
            bootstrap_stable_hours: 24,
            k_target: 5,
            alpha: 0.3,
            min_stake: 100,
            attest_threshold: 1,
        }
    }
}

/// Lease and heartbeat parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Minimum accepted lease TTL in seconds.
    pub min_ttl_secs: u64,
    /// Heartbeat interval assumed when a claim does not specify one.
    pub default_heartbeat_secs: u64,
    /// A heartbeat is missed after `interval * tolerance` without one.
    pub heartbeat_tolerance: u32,
    /// Lease monitor scan interval in seconds.
    pub check_interval_secs: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            min_ttl_secs: crate::lease::MIN_LEASE_TTL_SECS,
            default_heartbeat_secs: 30,
            heartbeat_tolerance: 3,
            check_interval_secs: 10,
        }
    }
}

/// Checkpointing and pruning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Epochs kept in hot storage before ops migrate to cold.
    pub keep_epochs: u64,
    /// zstd level for state-summary compression.
    pub compression_level: i32,
    pub enable_compression: bool,
    /// Verifier signatures required for a checkpoint to be trusted.
    pub signature_quorum: usize,
    /// Deadline for gathering checkpoint signatures.
    pub signature_timeout_secs: u64,
    /// Wall-clock length of an epoch for the checkpoint scheduler.
    pub epoch_interval_secs: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            keep_epochs: 10,
            compression_level: 3,
            enable_compression: true,
            signature_quorum: 1,
            signature_timeout_secs: 30,
            epoch_interval_secs: 3600,
        }
    }
}

/// Policy gate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyLimits {
    /// Hard gas cap per policy evaluation.
    pub gas_limit: u64,
    /// Maximum canonical payload size in bytes.
    pub max_payload_bytes: usize,
}

impl Default for PolicyLimits {
    fn default() -> Self {
        Self {
            gas_limit: 100_000,
            max_payload_bytes: 1_048_576,
        }
    }
}

/// Top-level node configuration, assembled from the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Base directory for checkpoints, cold storage, and identity.
    pub state_dir: PathBuf,
    /// Gossip listen address (multiaddr form).
    pub listen_addr: String,
    pub decide_backend: DecideBackend,
    pub quorum: QuorumConfig,
    pub lease: LeaseConfig,
    pub checkpoint: CheckpointConfig,
    pub policy: PolicyLimits,
    /// Bounded dispatch queue depth.
    pub dispatch_queue_depth: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("./swarm-data"),
            listen_addr: "/ip4/0.0.0.0/tcp/0".to_string(),
            decide_backend: DecideBackend::Cas,
            quorum: QuorumConfig::default(),
            lease: LeaseConfig::default(),
            checkpoint: CheckpointConfig::default(),
            policy: PolicyLimits::default(),
            dispatch_queue_depth: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_decide_backend_parse() {
        assert_eq!(DecideBackend::from_str("cas").unwrap(), DecideBackend::Cas);
        assert_eq!(DecideBackend::from_str("raft").unwrap(), DecideBackend::Raft);
        assert!(DecideBackend::from_str("etcd").is_err());
    }

    #[test]
    fn test_defaults_match_protocol_constants() {
        let q = QuorumConfig::default();
        assert_eq!(q.bootstrap_threshold, 10);
        assert_eq!(q.k_target, 5);
        assert_eq!(PolicyLimits::default().max_payload_bytes, 1 << 20);
    }
}
