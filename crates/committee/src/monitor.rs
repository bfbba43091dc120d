// Path: crates/committee/src/monitor.rs

//! Bootstrap monitor: an hourly background task tracking how long the
//! swarm has been above the bootstrap threshold.

use crate::bootstrap::BootstrapManager;
use crate::pool::VerifierPool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Snapshot of the monitor's view of the swarm.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapStatus {
    pub bootstrap_mode: bool,
    pub active_verifiers: usize,
    pub k_value: usize,
    pub hours_above_threshold: u64,
    pub should_exit: bool,
}

struct MonitorState {
    hours_above_threshold: u64,
    last_bootstrap: bool,
}

pub struct BootstrapMonitor {
    pool: Arc<VerifierPool>,
    manager: BootstrapManager,
    min_stake: u64,
    state: Mutex<MonitorState>,
}

impl BootstrapMonitor {
    pub fn new(pool: Arc<VerifierPool>, manager: BootstrapManager, min_stake: u64) -> Self {
        Self {
            pool,
            manager,
            min_stake,
            state: Mutex::new(MonitorState {
                hours_above_threshold: 0,
                last_bootstrap: true,
            }),
        }
    }

    /// One hourly check: advance or reset the stability counter and log
    /// mode transitions.
    pub fn tick(&self) -> BootstrapStatus {
        let active = self.pool.active_count(self.min_stake);
        let is_bootstrap = self.manager.is_bootstrap(active);
        let k_value = self.manager.k_plan(active);

        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        if active >= self.manager.bootstrap_threshold {
            state.hours_above_threshold += 1;
        } else {
            state.hours_above_threshold = 0;
        }

        if is_bootstrap != state.last_bootstrap {
            if is_bootstrap {
                warn!(
                    target: "committee",
                    active,
                    threshold = self.manager.bootstrap_threshold,
                    "entered bootstrap mode"
                );
            } else {
                info!(target: "committee", active, k = k_value, "exited bootstrap mode");
            }
        }
        state.last_bootstrap = is_bootstrap;

        let should_exit =
            self.manager
                .should_exit_bootstrap(active, state.hours_above_threshold);
        if should_exit && is_bootstrap {
            info!(
                target: "committee",
                active,
                hours = state.hours_above_threshold,
                required = self.manager.stable_hours,
                "bootstrap exit criteria met"
            );
        }

        debug!(
            target: "committee",
            bootstrap = is_bootstrap,
            active,
            k = k_value,
            hours_above = state.hours_above_threshold,
            "bootstrap status"
        );

        BootstrapStatus {
            bootstrap_mode: is_bootstrap,
            active_verifiers: active,
            k_value,
            hours_above_threshold: state.hours_above_threshold,
            should_exit,
        }
    }

    pub fn status(&self) -> BootstrapStatus {
        let active = self.pool.active_count(self.min_stake);
        let hours = self
            .state
            .lock()
            .map(|s| s.hours_above_threshold)
            .unwrap_or(0);
        BootstrapStatus {
            bootstrap_mode: self.manager.is_bootstrap(active),
            active_verifiers: active,
            k_value: self.manager.k_plan(active),
            hours_above_threshold: hours,
            should_exit: self.manager.should_exit_bootstrap(active, hours),
        }
    }

    /// Run the hourly loop until the stop signal fires. Inflight ticks
    /// complete; no new tick starts after stop.
    pub fn spawn(
        monitor: Arc<Self>,
        check_interval: Duration,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first interval tick fires immediately; skip it so the
            // first real check lands one period in.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let monitor = Arc::clone(&monitor);
                        // tick() only touches mutex-guarded state; a panic
                        // here must not take down the node.
                        if let Err(e) = tokio::task::spawn_blocking(move || monitor.tick()).await {
                            error!(target: "committee", "bootstrap monitor tick failed: {}", e);
                        }
                    }
                    _ = stop.changed() => {
                        if *stop.borrow() {
                            info!(target: "committee", "bootstrap monitor stopped");
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
    use crate::pool::sign_manifest;
    use swarm_crypto::sign::Ed25519KeyPair;
    use swarm_types::committee::{VerifierManifest, VerifierMetadata};

    fn register_n(pool: &VerifierPool, n: usize) {
        for i in 0..n {
            let kp = Ed25519KeyPair::generate();
            let manifest = VerifierManifest {
                verifier_id: format!("did:swarm:m{}", i),
                stake: 1000,
                capabilities: vec![],
                metadata: VerifierMetadata {
                    org_id: "o".into(),
                    asn: "a".into(),
                    region: "r".into(),
                    reputation: 0.9,
                },
                pubkey: vec![],
                registered_at_ns: 0,
                active: true,
                signature: String::new(),
            };
            pool.register(sign_manifest(&kp, manifest).unwrap()).unwrap();
        }
    }

    #[test]
    fn test_bootstrap_exit_after_stable_hours() {
        let pool = Arc::new(VerifierPool::new());
        register_n(&pool, 3);
        let monitor = BootstrapMonitor::new(Arc::clone(&pool), BootstrapManager::default(), 100);

        // 3 verifiers: bootstrap, K=1.
        let status = monitor.tick();
        assert!(status.bootstrap_mode);
        assert_eq!(status.k_value, 1);
        assert_eq!(status.hours_above_threshold, 0);

        // Grow to 12 active verifiers.
        register_n(&pool, 12);
        for hour in 1..24 {
            let status = monitor.tick();
            assert_eq!(status.hours_above_threshold, hour);
            assert!(!status.should_exit);
        }
        let status = monitor.tick();
        assert_eq!(status.hours_above_threshold, 24);
        assert!(status.should_exit);
        // min(5, max(2, floor(12 * 0.3))) = 3.
        assert_eq!(status.k_value, 3);
    }

    #[test]
    fn test_counter_resets_on_dip() {
        let pool = Arc::new(VerifierPool::new());
        register_n(&pool, 11);
        let monitor = BootstrapMonitor::new(Arc::clone(&pool), BootstrapManager::default(), 100);

        monitor.tick();
        monitor.tick();
        assert_eq!(monitor.status().hours_above_threshold, 2);

        // Deactivate enough to dip below threshold.
        pool.deactivate("did:swarm:m0").unwrap();
        pool.deactivate("did:swarm:m1").unwrap();
        let status = monitor.tick();
        assert_eq!(status.hours_above_threshold, 0);
        assert!(status.bootstrap_mode);
    }
}
