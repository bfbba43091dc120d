// Path: crates/lease/src/monitor.rs

//! The lease monitor: a periodic task that scavenges expired and silent
//! leases by emitting system-signed RELEASE envelopes.

use crate::heartbeat::HeartbeatProtocol;
use crate::manager::LeaseManager;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use swarm_types::lease::{Lease, ReleaseReason};
use swarm_types::time::now_ns;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Where RELEASE notifications go. The node implements this by building a
/// system-signed RELEASE envelope, publishing it, and dispatching locally.
#[async_trait]
pub trait ReleaseSink: Send + Sync {
    async fn publish_release(&self, lease: &Lease, reason: ReleaseReason);
}

pub struct LeaseMonitor {
    lease_manager: Arc<LeaseManager>,
    heartbeat_protocol: Arc<HeartbeatProtocol>,
    sink: Arc<dyn ReleaseSink>,
}

impl LeaseMonitor {
    pub fn new(
        lease_manager: Arc<LeaseManager>,
        heartbeat_protocol: Arc<HeartbeatProtocol>,
        sink: Arc<dyn ReleaseSink>,
    ) -> Self {
        Self {
            lease_manager,
            heartbeat_protocol,
            sink,
        }
    }

    /// One scan: expired leases first, then heartbeat misses.
    pub async fn scan(&self, now_ns: u64) {
        for lease_id in self.lease_manager.check_expiry(now_ns) {
            self.scavenge(&lease_id, ReleaseReason::Timeout).await;
        }
        for lease_id in self.heartbeat_protocol.check_missed(now_ns) {
            self.scavenge(&lease_id, ReleaseReason::HeartbeatMiss).await;
        }
    }

    async fn scavenge(&self, lease_id: &Uuid, reason: ReleaseReason) {
        let lease = match self.lease_manager.get(lease_id) {
            Some(lease) => lease,
            None => {
                // Already deleted (e.g. expiry and miss in one scan);
                // just drop the expectation.
                self.heartbeat_protocol.remove_expectation(lease_id);
                return;
            }
        };
        warn!(
            target: "lease",
            lease = %lease_id,
            task = %lease.task_id,
            reason = reason.as_str(),
            "scavenging lease"
        );
        self.sink.publish_release(&lease, reason).await;
        self.heartbeat_protocol.remove_expectation(lease_id);
        self.lease_manager.delete(lease_id);
    }

    /// Run the scan loop until the stop signal fires. Errors are logged
    /// and the loop continues on the next tick.
    pub fn spawn(
        monitor: Arc<Self>,
        check_interval: Duration,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                target: "lease",
                interval_secs = check_interval.as_secs(),
                "lease monitor started"
            );
            let mut ticker = tokio::time::interval(check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let result = tokio::time::timeout(
                            check_interval,
                            monitor.scan(now_ns()),
                        ).await;
                        if result.is_err() {
                            error!(target: "lease", "lease scan overran its interval");
                        }
                    }
                    _ = stop.changed() => {
                        if *stop.borrow() {
                            info!(target: "lease", "lease monitor stopped");
                            return;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use swarm_types::config::LeaseConfig;

    const SEC: u64 = 1_000_000_000;

    #[derive(Default)]
    struct RecordingSink {
        released: Mutex<Vec<(Uuid, ReleaseReason)>>,
    }

    #[async_trait]
    impl ReleaseSink for RecordingSink {
        async fn publish_release(&self, lease: &Lease, reason: ReleaseReason) {
            if let Ok(mut released) = self.released.lock() {
                released.push((lease.lease_id, reason));
            }
        }
    }

    fn setup() -> (Arc<LeaseManager>, Arc<HeartbeatProtocol>, Arc<RecordingSink>, LeaseMonitor) {
        let manager = Arc::new(LeaseManager::new(LeaseConfig::default()));
        let protocol = Arc::new(HeartbeatProtocol::new(3));
        let sink = Arc::new(RecordingSink::default());
        let monitor = LeaseMonitor::new(
            Arc::clone(&manager),
            Arc::clone(&protocol),
            Arc::clone(&sink) as Arc<dyn ReleaseSink>,
        );
        (manager, protocol, sink, monitor)
    }

    #[tokio::test]
    async fn test_expired_lease_released_with_timeout_reason() {
        let (manager, protocol, sink, monitor) = setup();
        let lease = manager.create(Uuid::new_v4(), "t1", "th", "w", 60, 10, 0).unwrap();
        protocol.expect(lease.lease_id, 10, 0);

        monitor.scan(61 * SEC).await;

        let released = sink.released.lock().unwrap().clone();
        assert_eq!(released, vec![(lease.lease_id, ReleaseReason::Timeout)]);
        assert!(manager.get(&lease.lease_id).is_none());
        assert!(protocol.is_empty());
    }

    #[tokio::test]
    async fn test_silent_lease_released_with_heartbeat_miss() {
        let (manager, protocol, sink, monitor) = setup();
        // ttl 600s so the TTL itself does not expire; hb interval 2s,
        // tolerance 3 → miss after 6s of silence.
        let lease = manager.create(Uuid::new_v4(), "t1", "th", "w", 600, 2, 0).unwrap();
        protocol.expect(lease.lease_id, 2, 0);

        monitor.scan(7 * SEC).await;

        let released = sink.released.lock().unwrap().clone();
        assert_eq!(
            released,
            vec![(lease.lease_id, ReleaseReason::HeartbeatMiss)]
        );
        assert!(manager.get(&lease.lease_id).is_none());
    }

    #[tokio::test]
    async fn test_live_lease_untouched() {
        let (manager, protocol, sink, monitor) = setup();
        let lease = manager.create(Uuid::new_v4(), "t1", "th", "w", 600, 30, 0).unwrap();
        protocol.expect(lease.lease_id, 30, 0);

        monitor.scan(10 * SEC).await;

        assert!(sink.released.lock().unwrap().is_empty());
        assert!(manager.get(&lease.lease_id).is_some());
    }
}
