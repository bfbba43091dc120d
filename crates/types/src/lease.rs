// Path: crates/types/src/lease.rs

//! Lease records: the time-bounded right for a worker to execute a task.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum accepted lease TTL in seconds.
pub const MIN_LEASE_TTL_SECS: u64 = 60;

/// A lease held by a worker on a claimed task.
///
/// Invariants enforced at creation: `heartbeat_interval_secs` in
/// `(0, ttl_secs)`, `ttl_secs >= MIN_LEASE_TTL_SECS`, at most one active
/// lease per task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub lease_id: Uuid,
    pub task_id: String,
    /// Thread the claim arrived on; system RELEASE envelopes go back here.
    pub thread_id: String,
    /// Hex-encoded worker public key.
    pub worker_id: String,
    pub ttl_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub created_at_ns: u64,
    pub last_heartbeat_ns: u64,
}

impl Lease {
    /// Absolute expiry instant in nanoseconds.
    pub fn expires_at_ns(&self) -> u64 {
        self.created_at_ns
            .saturating_add(self.ttl_secs.saturating_mul(1_000_000_000))
    }

    pub fn expired(&self, now_ns: u64) -> bool {
        now_ns > self.expires_at_ns()
    }
}

/// Why a lease was released by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    Timeout,
    HeartbeatMiss,
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::HeartbeatMiss => "heartbeat_miss",
        }
    }
}
