// Path: crates/node/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]

//! Node assembly: construct every subsystem at startup, wire them by
//! handle, run the background tasks, and tear everything down
//! cooperatively. The binary in `main.rs` is a thin CLI over this.

use anyhow::{anyhow, Context, Result};
use swarm_api::CreditLedger;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swarm_api::{ContentStore, DecideCoordinator, LocalBlobStore, MemoryLedger};
use swarm_checkpoint::{FastSync, FastSyncReport, PruningManager, PruningPolicy, TieredStorage};
use swarm_checkpoint::CheckpointManager;
use swarm_committee::{
    BootstrapManager, BootstrapMonitor, BootstrapStatus, CommitteeSelector, QuorumTracker,
    ReputationTracker, VerifierPool,
};
use swarm_crypto::sign::Ed25519KeyPair;
use swarm_dispatch::{DispatchPool, Dispatcher, HandlerContext, SystemReleaseSink};
use swarm_lease::{HeartbeatProtocol, LeaseManager, LeaseMonitor};
use swarm_networking::Gossip;
use swarm_plan::{EnvelopeFactory, LamportClock, PlanStore, VersionTracker};
use swarm_policy::{GateEnforcer, PolicyEngine, PolicyRuleset};
use swarm_types::checkpoint::{CheckpointSignature, SignedCheckpoint};
use swarm_types::config::NodeConfig;
use swarm_types::envelope::{Envelope, VerbKind};
use swarm_types::error::DispatchError;
use swarm_types::plan::PlanOp;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct SwarmNode {
    config: NodeConfig,
    keypair: Arc<Ed25519KeyPair>,
    pub ctx: Arc<HandlerContext>,
    pub dispatcher: Arc<Dispatcher>,
    pub dispatch_pool: Arc<DispatchPool>,
    pub plan_store: Arc<PlanStore>,
    pub factory: Arc<EnvelopeFactory>,
    pub lease_manager: Arc<LeaseManager>,
    pub heartbeat_protocol: Arc<HeartbeatProtocol>,
    pub verifier_pool: Arc<VerifierPool>,
    pub quorum_tracker: Arc<QuorumTracker>,
    pub checkpoint_manager: Arc<CheckpointManager>,
    pub tiered_storage: Arc<TieredStorage>,
    pub bootstrap_monitor: Arc<BootstrapMonitor>,
    pub reputation: Arc<ReputationTracker>,
    pub ledger: Arc<MemoryLedger>,
    selector: CommitteeSelector,
    pruning: PruningManager,
    stop_tx: watch::Sender<bool>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl SwarmNode {
    /// Build every subsystem, subscribe to the gossip substrate, and
    /// start the background tasks.
    pub async fn start(config: NodeConfig, gossip: Arc<dyn Gossip>) -> Result<Self> {
        Self::start_with(config, gossip, None).await
    }

    /// Like `start`, with an externally shared DECIDE coordinator: the
    /// deployment shape where several nodes point at one consistent
    /// store.
    pub async fn start_with(
        config: NodeConfig,
        gossip: Arc<dyn Gossip>,
        shared_decide: Option<Arc<dyn DecideCoordinator>>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.state_dir)
            .with_context(|| format!("creating state dir {}", config.state_dir.display()))?;

        // 1. Identity.
        let keypair = Arc::new(load_or_create_identity(&config.state_dir)?);
        let clock = Arc::new(LamportClock::new());

        // 2. Policy engine and gates; the ruleset hash travels on every
        //    envelope this node builds.
        let engine = Arc::new(PolicyEngine::new(
            PolicyRuleset {
                max_payload_bytes: config.policy.max_payload_bytes,
                ..PolicyRuleset::default()
            },
            config.policy.gas_limit,
        ));
        let gates = Arc::new(GateEnforcer::new(Arc::clone(&engine)));
        let factory = Arc::new(EnvelopeFactory::new(
            Arc::clone(&clock),
            Arc::clone(&keypair),
            engine.policy_hash(),
        ));

        // 3. Plan store (durable), lease registry, committee machinery.
        let plan_store = Arc::new(PlanStore::open(&config.state_dir.join("oplog.jsonl"))?);
        let lease_manager = Arc::new(LeaseManager::new(config.lease.clone()));
        let heartbeat_protocol =
            Arc::new(HeartbeatProtocol::new(config.lease.heartbeat_tolerance));
        let quorum_tracker = Arc::new(QuorumTracker::new());
        let verifier_pool = Arc::new(VerifierPool::new());
        let bootstrap = BootstrapManager::new(&config.quorum);

        // 4. External collaborators.
        let decide = match shared_decide {
            Some(decide) => decide,
            None => swarm_consensus::coordinator_for(config.decide_backend, &config.state_dir)?,
        };
        let content_store: Arc<dyn ContentStore> =
            Arc::new(LocalBlobStore::open(config.state_dir.join("blobs"))?);
        let ledger = Arc::new(MemoryLedger::new());
        let reputation = Arc::new(ReputationTracker::new());
        let selector = CommitteeSelector::new(swarm_types::committee::DiversityConstraints::default());

        // 5. Dispatch.
        let ctx = Arc::new(HandlerContext::new(
            Arc::clone(&plan_store),
            Arc::clone(&factory),
            Arc::clone(&lease_manager),
            Arc::clone(&heartbeat_protocol),
            Arc::clone(&quorum_tracker),
            Arc::clone(&verifier_pool),
            bootstrap.clone(),
            decide,
            Arc::clone(&gates),
            content_store,
            Arc::new(VersionTracker::new()),
            Arc::clone(&gossip),
            config.quorum.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ctx)));
        let dispatch_pool = Arc::new(DispatchPool::start(
            Arc::clone(&dispatcher),
            config.dispatch_queue_depth,
        ));

        // 6. Checkpointing and pruning.
        let checkpoint_manager = Arc::new(CheckpointManager::open(
            &config.state_dir.join("checkpoints"),
            config.checkpoint.clone(),
        )?);
        let tiered_storage = Arc::new(TieredStorage::open(&config.state_dir.join("cold"))?);
        let pruning = PruningManager::new(
            PruningPolicy::new(config.checkpoint.keep_epochs),
            Arc::clone(&tiered_storage),
        );

        // 7. Background tasks.
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut background = Vec::new();

        let lease_monitor = Arc::new(LeaseMonitor::new(
            Arc::clone(&lease_manager),
            Arc::clone(&heartbeat_protocol),
            Arc::new(SystemReleaseSink::new(Arc::clone(&dispatcher))),
        ));
        background.push(LeaseMonitor::spawn(
            lease_monitor,
            Duration::from_secs(config.lease.check_interval_secs),
            stop_rx.clone(),
        ));

        let bootstrap_monitor = Arc::new(BootstrapMonitor::new(
            Arc::clone(&verifier_pool),
            bootstrap,
            config.quorum.min_stake,
        ));
        background.push(BootstrapMonitor::spawn(
            Arc::clone(&bootstrap_monitor),
            Duration::from_secs(3600),
            stop_rx.clone(),
        ));

        // 8. Gossip receive loop: every thread, every verb.
        let mut receiver = gossip
            .subscribe("/swarm/thread/*/*")
            .await
            .map_err(|e| anyhow!("gossip subscribe failed: {}", e))?;
        {
            let dispatch_pool = Arc::clone(&dispatch_pool);
            let mut stop = stop_rx.clone();
            background.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        message = receiver.recv() => {
                            let Some(message) = message else { break };
                            match serde_json::from_slice::<Envelope>(&message.data) {
                                Ok(envelope) => {
                                    if let Err(e) = dispatch_pool.submit(envelope).await {
                                        warn!(target: "node", "dispatch submit failed: {}", e);
                                    }
                                }
                                Err(e) => {
                                    warn!(target: "node", topic = %message.topic, "undecodable gossip payload: {}", e);
                                }
                            }
                        }
                        _ = stop.changed() => {
                            if *stop.borrow() { break }
                        }
                    }
                }
                info!(target: "node", "gossip receive loop stopped");
            }));
        }

        info!(
            target: "node",
            actor = %factory.actor_id(),
            state_dir = %config.state_dir.display(),
            listen = %config.listen_addr,
            "swarm node started"
        );

        Ok(Self {
            config,
            keypair,
            ctx,
            dispatcher,
            dispatch_pool,
            plan_store,
            factory,
            lease_manager,
            heartbeat_protocol,
            verifier_pool,
            quorum_tracker,
            checkpoint_manager,
            tiered_storage,
            bootstrap_monitor,
            reputation,
            ledger,
            selector,
            pruning,
            stop_tx,
            background: Mutex::new(background),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Hex-encoded public key: this node's actor id.
    pub fn actor_id(&self) -> String {
        self.factory.actor_id()
    }

    /// Build, preflight-check, and publish an envelope. Preflight denial
    /// aborts the publish.
    pub async fn publish_envelope(
        &self,
        kind: VerbKind,
        thread_id: &str,
        payload: serde_json::Value,
    ) -> Result<Envelope, DispatchError> {
        let envelope = self.factory.make_signed(kind, thread_id, payload)?;
        let decision = self.ctx.gates.preflight_validate(&envelope);
        if !decision.allowed {
            return Err(DispatchError::PolicyDenied {
                gate: "preflight",
                reason: decision.reason.unwrap_or_else(|| "denied".to_string()),
            });
        }
        self.ctx
            .publish(&envelope)
            .await
            .map_err(|e| DispatchError::Resource(e.to_string()))?;
        Ok(envelope)
    }

    /// Current bootstrap status snapshot.
    pub fn bootstrap_status(&self) -> BootstrapStatus {
        self.bootstrap_monitor.status()
    }

    /// Register a verifier manifest, moving its stake into escrow. The
    /// stake stays locked until the verifier unbonds through the ledger.
    pub async fn register_verifier(
        &self,
        manifest: swarm_types::committee::VerifierManifest,
    ) -> Result<()> {
        let account = manifest.verifier_id.clone();
        let stake = manifest.stake;
        self.verifier_pool.register(manifest)?;
        self.ledger
            .escrow(&account, stake, &format!("stake:{}", account))
            .await?;
        info!(target: "node", verifier = %account, stake, "verifier stake escrowed");
        Ok(())
    }

    /// Sample a verification committee of size `k` from the active pool.
    /// Manifests carry a portable reputation snapshot; the live tracker
    /// value supersedes it at selection time.
    pub fn select_committee(
        &self,
        k: usize,
    ) -> Result<Vec<swarm_types::committee::VerifierManifest>, swarm_types::error::CommitteeError>
    {
        let now = swarm_types::time::now_ns();
        let candidates: Vec<swarm_types::committee::VerifierManifest> = self
            .verifier_pool
            .active_verifiers(self.config.quorum.min_stake)
            .into_iter()
            .map(|mut manifest| {
                if self.reputation.tracked(&manifest.verifier_id) {
                    manifest.metadata.reputation =
                        self.reputation.reputation(&manifest.verifier_id, now);
                }
                manifest
            })
            .collect();
        let mut rng = rand::thread_rng();
        self.selector
            .select(&candidates, k, self.config.quorum.min_stake, now, &mut rng)
    }

    /// Seal the current epoch: checkpoint, self-sign, persist, advance the
    /// epoch counter, then prune ops that fell out of the retention
    /// window.
    pub fn seal_epoch(&self) -> Result<SignedCheckpoint> {
        let epoch = self.plan_store.current_epoch();
        let ops = self.plan_store.ops_in_epoch(epoch);
        let mut op_hashes = Vec::with_capacity(ops.len());
        for op in &ops {
            op_hashes.push(op.hash().map_err(|e| anyhow!("op hash failed: {}", e))?);
        }

        let checkpoint = self.checkpoint_manager.create_checkpoint(
            epoch,
            self.plan_store.state_summary(),
            &op_hashes,
            self.plan_store.max_lamport(),
            self.ctx.gates.policy_hash(),
        )?;
        let hash = checkpoint
            .compute_hash()
            .map_err(|e| anyhow!("checkpoint hash failed: {}", e))?;
        let signature = self.keypair.sign(hash.as_bytes());
        let signed = self.checkpoint_manager.sign_checkpoint(
            checkpoint,
            vec![CheckpointSignature {
                verifier_id: self.actor_id(),
                signature: hex::encode(signature.to_bytes()),
            }],
        )?;
        self.checkpoint_manager.store(&signed)?;
        self.plan_store.set_epoch(epoch + 1);

        let all = self.plan_store.all_ops();
        let (moved, _kept, moved_ids) = self.pruning.prune(&all, epoch + 1)?;
        if moved > 0 {
            self.plan_store.evict(&moved_ids);
        }
        Ok(signed)
    }

    /// Bootstrap this node's op-log from the latest signed checkpoint
    /// plus a replay source.
    pub fn fast_sync<F>(&self, fetch_ops: F) -> Result<FastSyncReport, swarm_types::error::SyncError>
    where
        F: FnOnce(u64) -> Vec<PlanOp>,
    {
        let sync = FastSync::new(
            Arc::clone(&self.checkpoint_manager),
            self.config.checkpoint.signature_quorum,
        );
        sync.sync(&self.plan_store, self.factory.clock(), fetch_ops)
    }

    /// Read one op, hot op-log first, then the cold archive.
    pub fn get_op(&self, op_id: &Uuid) -> Option<PlanOp> {
        self.plan_store
            .op(op_id)
            .or_else(|| self.tiered_storage.get(op_id))
    }

    /// Cooperative shutdown: signal every background loop, then drain the
    /// dispatch pool.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);
        let tasks: Vec<JoinHandle<()>> = match self.background.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for task in tasks {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                error!(target: "node", "background task did not stop in time");
            }
        }
        self.dispatch_pool.shutdown().await;
        info!(target: "node", "swarm node stopped");
    }
}

/// Load the node identity from the state dir, creating one on first run.
fn load_or_create_identity(state_dir: &Path) -> Result<Ed25519KeyPair> {
    let key_path = state_dir.join("identity.key");
    if key_path.exists() {
        let encoded = std::fs::read_to_string(&key_path)?;
        let seed = hex::decode(encoded.trim())
            .map_err(|e| anyhow!("corrupt identity key file: {}", e))?;
        return Ed25519KeyPair::from_seed(&seed).map_err(|e| anyhow!("bad identity seed: {}", e));
    }
    info!(target: "node", "initializing new node identity");
    let keypair = Ed25519KeyPair::generate();
    std::fs::write(&key_path, hex::encode(keypair.private_key().to_bytes()))?;
    Ok(keypair)
}
