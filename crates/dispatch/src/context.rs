// Path: crates/dispatch/src/context.rs

//! Shared handler context.
//!
//! Handlers receive every dependency by handle at construction; there is
//! no global state. The context also owns the small bits of cross-verb
//! bookkeeping (the ballot registry) that no single subsystem claims.

use crate::ids;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use swarm_api::{ContentStore, DecideCoordinator};
use swarm_committee::{BootstrapManager, QuorumTracker, VerifierPool};
use swarm_lease::{HeartbeatProtocol, LeaseManager};
use swarm_networking::Gossip;
use swarm_plan::{EnvelopeFactory, PlanStore, VersionTracker};
use swarm_policy::GateEnforcer;
use swarm_types::config::QuorumConfig;
use swarm_types::envelope::Envelope;
use swarm_types::error::{DispatchError, GossipError};
use swarm_types::plan::{OpType, PlanOp};
use tracing::debug;
use uuid::Uuid;

/// Deadline for one coordinator round-trip.
const DECIDE_DEADLINE: std::time::Duration = std::time::Duration::from_secs(2);

pub struct HandlerContext {
    pub plan_store: Arc<PlanStore>,
    pub factory: Arc<EnvelopeFactory>,
    pub lease_manager: Arc<LeaseManager>,
    pub heartbeat_protocol: Arc<HeartbeatProtocol>,
    pub quorum_tracker: Arc<QuorumTracker>,
    pub verifier_pool: Arc<VerifierPool>,
    pub bootstrap: BootstrapManager,
    pub decide: Arc<dyn DecideCoordinator>,
    pub gates: Arc<GateEnforcer>,
    pub content_store: Arc<dyn ContentStore>,
    pub version_tracker: Arc<VersionTracker>,
    pub gossip: Arc<dyn Gossip>,
    pub quorum_config: QuorumConfig,
    /// Ballots seen per proposer; duplicates are rejected.
    ballots: Mutex<HashMap<String, HashSet<String>>>,
}

impl HandlerContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        plan_store: Arc<PlanStore>,
        factory: Arc<EnvelopeFactory>,
        lease_manager: Arc<LeaseManager>,
        heartbeat_protocol: Arc<HeartbeatProtocol>,
        quorum_tracker: Arc<QuorumTracker>,
        verifier_pool: Arc<VerifierPool>,
        bootstrap: BootstrapManager,
        decide: Arc<dyn DecideCoordinator>,
        gates: Arc<GateEnforcer>,
        content_store: Arc<dyn ContentStore>,
        version_tracker: Arc<VersionTracker>,
        gossip: Arc<dyn Gossip>,
        quorum_config: QuorumConfig,
    ) -> Self {
        Self {
            plan_store,
            factory,
            lease_manager,
            heartbeat_protocol,
            quorum_tracker,
            verifier_pool,
            bootstrap,
            decide,
            gates,
            content_store,
            version_tracker,
            gossip,
            quorum_config,
            ballots: Mutex::new(HashMap::new()),
        }
    }

    /// Register a ballot for a proposer; `false` means duplicate.
    pub fn register_ballot(&self, proposer: &str, ballot: &str) -> bool {
        let mut ballots = match self.ballots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        ballots
            .entry(proposer.to_string())
            .or_default()
            .insert(ballot.to_string())
    }

    /// Build a plan op derived from an envelope: deterministic op id,
    /// envelope lamport (plus `lamport_offset`), envelope timestamp, so
    /// every replica writes the identical op.
    pub fn op_from_envelope(
        &self,
        envelope: &Envelope,
        role: &str,
        lamport_offset: u64,
        op_type: OpType,
        task_id: impl Into<String>,
        payload: Value,
    ) -> PlanOp {
        PlanOp {
            op_id: ids::derive_id(&envelope.id, role),
            thread_id: envelope.thread_id.clone(),
            lamport: envelope.lamport + lamport_offset,
            actor_id: envelope.actor_id(),
            op_type,
            task_id: task_id.into(),
            payload,
            timestamp_ns: envelope.ts_ns,
            epoch: 0,
        }
    }

    /// Append an op. Duplicate ids (replays) are logged and ignored;
    /// returns whether the op was actually appended.
    pub fn append(&self, op: PlanOp) -> Result<bool, DispatchError> {
        let op_id = op.op_id;
        let appended = self.plan_store.append(op)?;
        if !appended {
            debug!(target: "dispatch", op = %op_id, "replayed op ignored");
        }
        Ok(appended)
    }

    /// Publish a signed envelope on its thread/verb topic.
    pub async fn publish(&self, envelope: &Envelope) -> Result<(), GossipError> {
        let bytes =
            serde_json::to_vec(envelope).map_err(|e| GossipError::Encode(e.to_string()))?;
        self.gossip.publish(&envelope.topic(), bytes).await
    }

    /// Call the DECIDE coordinator under its deadline. A timeout is an
    /// error the caller retries later with the same inputs; the
    /// operation is idempotent on the coordinator side.
    pub async fn try_decide(
        &self,
        record: swarm_types::committee::DecideRecord,
    ) -> Result<Option<swarm_types::committee::DecideRecord>, swarm_types::error::DecideError> {
        match tokio::time::timeout(DECIDE_DEADLINE, self.decide.try_decide(record)).await {
            Ok(result) => result,
            Err(_) => Err(swarm_types::error::DecideError::Timeout),
        }
    }

    /// Dynamic quorum size from the live pool.
    pub fn current_k_plan(&self) -> usize {
        let active = self
            .verifier_pool
            .active_count(self.quorum_config.min_stake);
        self.bootstrap.k_plan(active)
    }

    pub fn derive_lease_id(&self, envelope_id: &Uuid) -> Uuid {
        ids::derive_id(envelope_id, "lease")
    }
}
