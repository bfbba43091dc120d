// Path: crates/lease/src/heartbeat.rs

//! Heartbeat expectations: which leases owe us a pulse, and how overdue
//! they are allowed to get.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

struct Expectation {
    last_heartbeat_ns: u64,
    interval_secs: u64,
}

pub struct HeartbeatProtocol {
    /// A heartbeat is missed after `interval × tolerance` of silence.
    tolerance: u32,
    expectations: Mutex<HashMap<Uuid, Expectation>>,
}

impl HeartbeatProtocol {
    pub fn new(tolerance: u32) -> Self {
        Self {
            tolerance: tolerance.max(1),
            expectations: Mutex::new(HashMap::new()),
        }
    }

    /// Start expecting heartbeats for a lease.
    pub fn expect(&self, lease_id: Uuid, interval_secs: u64, now_ns: u64) {
        if let Ok(mut exp) = self.expectations.lock() {
            exp.insert(
                lease_id,
                Expectation {
                    last_heartbeat_ns: now_ns,
                    interval_secs,
                },
            );
        }
    }

    /// Record a heartbeat; unknown leases are ignored (the expectation was
    /// already scavenged).
    pub fn receive_heartbeat(&self, lease_id: &Uuid, now_ns: u64) {
        if let Ok(mut exp) = self.expectations.lock() {
            if let Some(entry) = exp.get_mut(lease_id) {
                entry.last_heartbeat_ns = now_ns;
                debug!(target: "lease", lease = %lease_id, "heartbeat expectation refreshed");
            }
        }
    }

    pub fn remove_expectation(&self, lease_id: &Uuid) {
        if let Ok(mut exp) = self.expectations.lock() {
            exp.remove(lease_id);
        }
    }

    /// Leases silent for longer than `interval × tolerance`.
    pub fn check_missed(&self, now_ns: u64) -> Vec<Uuid> {
        let tolerance = self.tolerance as u64;
        self.expectations
            .lock()
            .map(|exp| {
                exp.iter()
                    .filter(|(_, e)| {
                        let deadline_ns = e
                            .interval_secs
                            .saturating_mul(tolerance)
                            .saturating_mul(1_000_000_000);
                        now_ns.saturating_sub(e.last_heartbeat_ns) > deadline_ns
                    })
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.expectations.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
