// Path: crates/lease/src/manager.rs

//! The lease registry: at most one active lease per task.

use std::collections::HashMap;
use std::sync::Mutex;
use swarm_types::config::LeaseConfig;
use swarm_types::error::LeaseError;
use swarm_types::lease::Lease;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Default)]
struct Registry {
    leases: HashMap<Uuid, Lease>,
    by_task: HashMap<String, Uuid>,
}

pub struct LeaseManager {
    config: LeaseConfig,
    registry: Mutex<Registry>,
}

impl LeaseManager {
    pub fn new(config: LeaseConfig) -> Self {
        Self {
            config,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        match self.registry.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Create a lease. Enforces the TTL floor, the heartbeat-interval
    /// window, and task uniqueness. The caller supplies the lease id;
    /// handlers derive it from the claim envelope so replicas agree on it.
    pub fn create(
        &self,
        lease_id: Uuid,
        task_id: &str,
        thread_id: &str,
        worker_id: &str,
        ttl_secs: u64,
        heartbeat_interval_secs: u64,
        now_ns: u64,
    ) -> Result<Lease, LeaseError> {
        if ttl_secs < self.config.min_ttl_secs {
            return Err(LeaseError::TtlTooShort {
                got: ttl_secs,
                min: self.config.min_ttl_secs,
            });
        }
        if heartbeat_interval_secs == 0 || heartbeat_interval_secs >= ttl_secs {
            return Err(LeaseError::InvalidHeartbeatInterval {
                interval: heartbeat_interval_secs,
                ttl: ttl_secs,
            });
        }
        self.with_registry(|registry| {
            if let Some(existing) = registry.by_task.get(task_id) {
                if registry.leases.contains_key(existing) {
                    return Err(LeaseError::TaskAlreadyLeased(task_id.to_string()));
                }
            }
            let lease = Lease {
                lease_id,
                task_id: task_id.to_string(),
                thread_id: thread_id.to_string(),
                worker_id: worker_id.to_string(),
                ttl_secs,
                heartbeat_interval_secs,
                created_at_ns: now_ns,
                last_heartbeat_ns: now_ns,
            };
            registry.by_task.insert(task_id.to_string(), lease.lease_id);
            registry.leases.insert(lease.lease_id, lease.clone());
            info!(
                target: "lease",
                lease = %lease.lease_id,
                task = %task_id,
                worker = %worker_id,
                ttl = ttl_secs,
                hb = heartbeat_interval_secs,
                "lease created"
            );
            Ok(lease)
        })
    }

    /// Record a heartbeat from the owning worker.
    pub fn heartbeat(
        &self,
        lease_id: &Uuid,
        worker_id: &str,
        now_ns: u64,
    ) -> Result<(), LeaseError> {
        self.with_registry(|registry| {
            let lease = registry
                .leases
                .get_mut(lease_id)
                .ok_or(LeaseError::NotFound(*lease_id))?;
            if lease.worker_id != worker_id {
                return Err(LeaseError::WorkerMismatch {
                    expected: lease.worker_id.clone(),
                    got: worker_id.to_string(),
                });
            }
            lease.last_heartbeat_ns = now_ns;
            debug!(target: "lease", lease = %lease_id, "heartbeat recorded");
            Ok(())
        })
    }

    pub fn get(&self, lease_id: &Uuid) -> Option<Lease> {
        self.with_registry(|registry| registry.leases.get(lease_id).cloned())
    }

    pub fn lease_for_task(&self, task_id: &str) -> Option<Lease> {
        self.with_registry(|registry| {
            let id = registry.by_task.get(task_id)?;
            registry.leases.get(id).cloned()
        })
    }

    pub fn delete(&self, lease_id: &Uuid) -> Option<Lease> {
        self.with_registry(|registry| {
            let lease = registry.leases.remove(lease_id)?;
            if registry.by_task.get(&lease.task_id) == Some(lease_id) {
                registry.by_task.remove(&lease.task_id);
            }
            info!(target: "lease", lease = %lease_id, task = %lease.task_id, "lease deleted");
            Some(lease)
        })
    }

    /// Leases whose TTL has elapsed at `now_ns`.
    pub fn check_expiry(&self, now_ns: u64) -> Vec<Uuid> {
        self.with_registry(|registry| {
            registry
                .leases
                .values()
                .filter(|lease| lease.expired(now_ns))
                .map(|lease| lease.lease_id)
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.with_registry(|registry| registry.leases.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
