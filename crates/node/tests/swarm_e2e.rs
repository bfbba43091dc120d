// Path: crates/node/tests/swarm_e2e.rs

//! End-to-end swarm scenarios over the in-process gossip mesh: three
//! nodes sharing one DECIDE coordinator, driven through the full
//! NEED → PROPOSE → ATTEST_PLAN → DECIDE → CLAIM → HEARTBEAT → COMMIT →
//! FINALIZE lifecycle, plus checkpoint and fast-sync flows.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use swarm_api::{ContentStore, DecideCoordinator};
use swarm_committee::pool::sign_manifest;
use swarm_consensus::KvCasCoordinator;
use swarm_crypto::sign::Ed25519KeyPair;
use swarm_dispatch::SystemReleaseSink;
use swarm_lease::LeaseMonitor;
use swarm_networking::{Gossip, GossipMesh};
use swarm_node::SwarmNode;
use swarm_types::committee::{VerifierManifest, VerifierMetadata};
use swarm_types::config::NodeConfig;
use swarm_types::envelope::VerbKind;
use swarm_types::plan::{OpType, PlanOp, TaskState};
use swarm_types::time::now_ns;
use tempfile::TempDir;
use uuid::Uuid;

const SEC_NS: u64 = 1_000_000_000;

struct Swarm {
    nodes: Vec<SwarmNode>,
    decide: Arc<KvCasCoordinator>,
    _dir: TempDir,
}

async fn swarm(n: usize) -> Swarm {
    let dir = tempfile::tempdir().unwrap();
    let mesh = GossipMesh::new();
    let decide = Arc::new(KvCasCoordinator::open(&dir.path().join("decide")).unwrap());

    let mut nodes = Vec::new();
    for i in 0..n {
        let config = NodeConfig {
            state_dir: dir.path().join(format!("node-{}", i)),
            ..NodeConfig::default()
        };
        let gossip: Arc<dyn Gossip> = Arc::new(mesh.join(format!("node-{}", i)));
        let node = SwarmNode::start_with(
            config,
            gossip,
            Some(Arc::clone(&decide) as Arc<dyn DecideCoordinator>),
        )
        .await
        .unwrap();
        nodes.push(node);
    }
    Swarm {
        nodes,
        decide,
        _dir: dir,
    }
}

/// Register one verifier identity in every node's pool, funding and
/// escrowing its stake; the manifest's verifier id must match the
/// attesting envelope's actor id.
async fn register_verifier(swarm: &Swarm, keypair: &Ed25519KeyPair) {
    let verifier_id = hex::encode(keypair.public_key().to_bytes());
    for node in &swarm.nodes {
        let manifest = VerifierManifest {
            verifier_id: verifier_id.clone(),
            stake: 1_000,
            capabilities: vec!["attest".into()],
            metadata: VerifierMetadata {
                org_id: "org_a".into(),
                asn: "AS1".into(),
                region: "us-west".into(),
                reputation: 0.9,
            },
            pubkey: vec![],
            registered_at_ns: 0,
            active: true,
            signature: String::new(),
        };
        node.ledger.credit(&verifier_id, 1_000);
        node.register_verifier(sign_manifest(keypair, manifest).unwrap())
            .await
            .unwrap();
    }
}

/// Poll until `cond` holds or the timeout elapses.
async fn wait_until<F: Fn() -> bool>(cond: F, what: &str) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for: {}", what);
}

fn added_task(node: &SwarmNode, thread: &str) -> Option<String> {
    node.plan_store
        .ops_for_thread(thread)
        .into_iter()
        .find(|op| op.op_type == OpType::AddTask)
        .map(|op| op.task_id)
}

#[tokio::test]
async fn test_s1_full_happy_path() {
    let swarm = swarm(3).await;
    let (a, b, c) = (&swarm.nodes[0], &swarm.nodes[1], &swarm.nodes[2]);

    // Node C will attest; register it as a verifier everywhere. One
    // active verifier keeps the swarm in bootstrap: K = 1.
    let c_key = Ed25519KeyPair::from_seed(&c_identity_seed(c)).unwrap();
    register_verifier(&swarm, &c_key).await;

    // With one staked verifier, a committee of one is exactly C.
    let committee = a.select_committee(1).unwrap();
    assert_eq!(committee[0].verifier_id, c.actor_id());

    // A: NEED. The task appears in every node's log.
    a.publish_envelope(VerbKind::Need, "t1", json!({"task_type": "gen"}))
        .await
        .unwrap();
    wait_until(
        || swarm.nodes.iter().all(|n| added_task(n, "t1").is_some()),
        "NEED replicated",
    )
    .await;
    let task = added_task(a, "t1").unwrap();
    assert_eq!(added_task(b, "t1"), Some(task.clone()));

    // B: PROPOSE p1.
    b.publish_envelope(
        VerbKind::Propose,
        "t1",
        json!({"need_id": task, "proposal_id": "p1"}),
    )
    .await
    .unwrap();
    wait_until(
        || {
            swarm.nodes.iter().all(|n| {
                n.plan_store
                    .task(&task)
                    .map(|v| v.annotations.iter().any(|x| x["annotation_type"] == "proposal"))
                    .unwrap_or(false)
            })
        },
        "PROPOSE replicated",
    )
    .await;

    // C: ATTEST_PLAN approve. K=1, so this elects the DECIDE.
    c.publish_envelope(
        VerbKind::AttestPlan,
        "t1",
        json!({"need_id": task, "proposal_id": "p1", "verdict": "approve"}),
    )
    .await
    .unwrap();
    let mut decision = None;
    for _ in 0..200 {
        if let Some(d) = swarm.decide.get_decision(&task).await.unwrap() {
            decision = Some(d);
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    let decision = decision.expect("DECIDE recorded");
    assert_eq!(decision.proposal_id, "p1");

    // The emitted DECIDE envelope marks the task DECIDED everywhere.
    wait_until(
        || {
            swarm.nodes.iter().all(|n| {
                n.plan_store
                    .task(&task)
                    .map(|v| v.state == TaskState::Decided)
                    .unwrap_or(false)
            })
        },
        "DECIDE replicated",
    )
    .await;

    // Re-publishing C's attestation is a no-op: still one decision, one
    // approval.
    c.publish_envelope(
        VerbKind::AttestPlan,
        "t1",
        json!({"need_id": task, "proposal_id": "p1", "verdict": "approve"}),
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(a.quorum_tracker.count(&task, "p1"), 1);

    // B: CLAIM with lease.
    b.publish_envelope(
        VerbKind::ClaimExtended,
        "t1",
        json!({"task_id": task, "lease_ttl": 120, "heartbeat_interval": 30}),
    )
    .await
    .unwrap();
    wait_until(
        || swarm.nodes.iter().all(|n| n.lease_manager.lease_for_task(&task).is_some()),
        "lease replicated",
    )
    .await;
    let lease = b.lease_manager.lease_for_task(&task).unwrap();
    assert_eq!(lease.worker_id, b.actor_id());

    // B: HEARTBEAT advances last_heartbeat_ns.
    let before = lease.last_heartbeat_ns;
    b.publish_envelope(
        VerbKind::Heartbeat,
        "t1",
        json!({"lease_id": lease.lease_id, "worker_id": b.actor_id(), "progress": 50}),
    )
    .await
    .unwrap();
    wait_until(
        || {
            b.lease_manager
                .get(&lease.lease_id)
                .map(|l| l.last_heartbeat_ns > before)
                .unwrap_or(false)
        },
        "heartbeat recorded",
    )
    .await;

    // B: COMMIT an artifact that exists in CAS.
    let mut cid = String::new();
    for node in &swarm.nodes {
        cid = node.ctx.content_store.put(b"hello").await.unwrap();
    }
    b.publish_envelope(
        VerbKind::Commit,
        "t1",
        json!({"task_id": task, "artifact_hash": cid}),
    )
    .await
    .unwrap();
    wait_until(
        || {
            swarm.nodes.iter().all(|n| {
                n.plan_store
                    .task(&task)
                    .map(|v| v.annotations.iter().any(|x| x["annotation_type"] == "commit"))
                    .unwrap_or(false)
            })
        },
        "COMMIT replicated",
    )
    .await;

    // B: FINALIZE.
    b.publish_envelope(VerbKind::Finalize, "t1", json!({"task_id": task}))
        .await
        .unwrap();
    wait_until(
        || {
            swarm.nodes.iter().all(|n| {
                n.plan_store
                    .task(&task)
                    .map(|v| v.state == TaskState::Final)
                    .unwrap_or(false)
            })
        },
        "FINALIZE replicated",
    )
    .await;

    // The op-logs converged: identical range hash on A, B, and C.
    let max_lamport = swarm
        .nodes
        .iter()
        .map(|n| n.plan_store.max_lamport())
        .max()
        .unwrap();
    wait_until(
        || {
            swarm
                .nodes
                .iter()
                .all(|n| n.plan_store.max_lamport() == max_lamport)
        },
        "logs converged",
    )
    .await;
    let hashes: Vec<String> = swarm
        .nodes
        .iter()
        .map(|n| n.plan_store.range_hash(1, max_lamport).unwrap())
        .collect();
    assert_eq!(hashes[0], hashes[1]);
    assert_eq!(hashes[1], hashes[2]);

    for node in &swarm.nodes {
        node.stop().await;
    }
}

/// Read a node's identity seed back from its state dir so tests can sign
/// verifier manifests with the node's own key.
fn c_identity_seed(node: &SwarmNode) -> Vec<u8> {
    let path = node.config().state_dir.join("identity.key");
    hex::decode(std::fs::read_to_string(path).unwrap().trim()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_s2_concurrent_decides_elect_one_winner() {
    let swarm = swarm(2).await;
    let (a, b) = (&swarm.nodes[0], &swarm.nodes[1]);

    let a_key = Ed25519KeyPair::from_seed(&c_identity_seed(a)).unwrap();
    let b_key = Ed25519KeyPair::from_seed(&c_identity_seed(b)).unwrap();
    register_verifier(&swarm, &a_key).await;
    register_verifier(&swarm, &b_key).await;

    // Two verifiers are still bootstrap (< 10): K = 1, so each approval
    // immediately races for the DECIDE of the same need.
    let (ra, rb) = tokio::join!(
        a.publish_envelope(
            VerbKind::AttestPlan,
            "t1",
            json!({"need_id": "n1", "proposal_id": "p-a", "verdict": "approve"}),
        ),
        b.publish_envelope(
            VerbKind::AttestPlan,
            "t1",
            json!({"need_id": "n1", "proposal_id": "p-b", "verdict": "approve"}),
        ),
    );
    ra.unwrap();
    rb.unwrap();

    let mut decision = None;
    for _ in 0..200 {
        if let Some(d) = swarm.decide.get_decision("n1").await.unwrap() {
            decision = Some(d);
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Exactly one winner, observable by both proposers.
    let decision = decision.expect("a winner");
    assert!(decision.proposal_id == "p-a" || decision.proposal_id == "p-b");
    assert_eq!(
        swarm
            .decide
            .get_decision("n1")
            .await
            .unwrap()
            .unwrap()
            .proposal_id,
        decision.proposal_id
    );

    for node in &swarm.nodes {
        node.stop().await;
    }
}

#[tokio::test]
async fn test_s3_heartbeat_miss_release_reclaim() {
    let swarm = swarm(2).await;
    let (a, b) = (&swarm.nodes[0], &swarm.nodes[1]);

    // A claims with the minimum TTL and a 2s heartbeat interval
    // (tolerance 3 → missed after 6s of silence).
    a.publish_envelope(
        VerbKind::ClaimExtended,
        "t1",
        json!({"task_id": "task-1", "lease_ttl": 60, "heartbeat_interval": 2}),
    )
    .await
    .unwrap();
    wait_until(
        || swarm.nodes.iter().all(|n| n.lease_manager.lease_for_task("task-1").is_some()),
        "lease replicated",
    )
    .await;
    let old_lease = a.lease_manager.lease_for_task("task-1").unwrap();

    // Drive A's monitor with a synthetic clock 7s ahead instead of
    // sleeping through real time.
    let monitor = LeaseMonitor::new(
        Arc::clone(&a.lease_manager),
        Arc::clone(&a.heartbeat_protocol),
        Arc::new(SystemReleaseSink::new(Arc::clone(&a.dispatcher))),
    );
    monitor.scan(now_ns() + 7 * SEC_NS).await;

    assert!(a.lease_manager.get(&old_lease.lease_id).is_none());
    wait_until(
        || {
            swarm.nodes.iter().all(|n| {
                n.plan_store
                    .task("task-1")
                    .map(|v| v.state == TaskState::Draft)
                    .unwrap_or(false)
                    && n.lease_manager.get(&old_lease.lease_id).is_none()
            })
        },
        "RELEASE replicated",
    )
    .await;
    let release = a
        .plan_store
        .task("task-1")
        .unwrap()
        .annotations
        .iter()
        .find(|x| x["annotation_type"] == "release")
        .cloned()
        .unwrap();
    assert_eq!(release["reason"], "heartbeat_miss");

    // A different worker re-claims.
    b.publish_envelope(
        VerbKind::ClaimExtended,
        "t1",
        json!({"task_id": "task-1", "lease_ttl": 120, "heartbeat_interval": 30}),
    )
    .await
    .unwrap();
    wait_until(
        || b.lease_manager.lease_for_task("task-1").is_some(),
        "re-claim",
    )
    .await;
    let new_lease = b.lease_manager.lease_for_task("task-1").unwrap();
    assert_ne!(new_lease.lease_id, old_lease.lease_id);
    assert_eq!(new_lease.worker_id, b.actor_id());
    assert_eq!(b.plan_store.task("task-1").unwrap().state, TaskState::Decided);

    for node in &swarm.nodes {
        node.stop().await;
    }
}

fn probe_op(lamport: u64, epoch: u64, task: &str) -> PlanOp {
    PlanOp {
        op_id: Uuid::new_v4(),
        thread_id: "t1".into(),
        lamport,
        actor_id: "aa".into(),
        op_type: OpType::Annotate,
        task_id: task.into(),
        payload: json!({"l": lamport}),
        timestamp_ns: lamport,
        epoch,
    }
}

#[tokio::test]
async fn test_s5_checkpoint_roundtrip_and_s6_fast_sync() {
    let swarm = swarm(1).await;
    let origin = &swarm.nodes[0];

    // 1000 ops across 5 epochs (200 per epoch, epochs 1..=5).
    let mut state_ops = Vec::new();
    for lamport in 1..=1000u64 {
        let epoch = (lamport - 1) / 200 + 1;
        let op = probe_op(lamport, epoch, &format!("task-{}", (lamport - 1) / 100));
        state_ops.push(op.clone());
        origin.plan_store.append(op).unwrap();
    }
    origin.plan_store.set_epoch(5);

    // Seal through epoch 4: checkpoint over the first 800 ops.
    let first_800: Vec<PlanOp> = state_ops[..800].to_vec();
    let op_hashes: Vec<String> = first_800.iter().map(|op| op.hash().unwrap()).collect();
    let summary = origin.plan_store.state_summary();
    let checkpoint = origin
        .checkpoint_manager
        .create_checkpoint(4, summary.clone(), &op_hashes, 800, "ph")
        .unwrap();
    let signed = origin
        .checkpoint_manager
        .sign_checkpoint(
            checkpoint,
            vec![swarm_types::checkpoint::CheckpointSignature {
                verifier_id: origin.actor_id(),
                signature: "sig".into(),
            }],
        )
        .unwrap();
    origin.checkpoint_manager.store(&signed).unwrap();

    // S5: reload from disk; root and summary survive the compression
    // roundtrip.
    origin.checkpoint_manager.clear_cache();
    let loaded = origin.checkpoint_manager.get(4).unwrap();
    assert_eq!(loaded.checkpoint.state_summary, summary);
    let mut tree = swarm_checkpoint::MerkleTree::new();
    let leaves: Vec<[u8; 32]> = op_hashes
        .iter()
        .map(|h| hex::decode(h).unwrap().try_into().unwrap())
        .collect();
    assert_eq!(loaded.checkpoint.merkle_root, hex::encode(tree.build(leaves)));

    // S6: a fresh node sharing the checkpoint directory fast-syncs and
    // replays ops 801..1000.
    let fresh_dir = tempfile::tempdir().unwrap();
    let mesh = GossipMesh::new();
    let config = NodeConfig {
        state_dir: fresh_dir.path().join("fresh"),
        ..NodeConfig::default()
    };
    let fresh = SwarmNode::start(config, Arc::new(mesh.join("fresh")) as Arc<dyn Gossip>)
        .await
        .unwrap();
    // Point the fresh node's sync at the origin's checkpoint store and
    // use the origin as the replay source for ops past the checkpoint.
    let sync = swarm_checkpoint::FastSync::new(Arc::clone(&origin.checkpoint_manager), 1);
    let report = sync
        .sync(&fresh.plan_store, fresh.factory.clock(), |after| {
            origin.plan_store.ops_after_lamport(after)
        })
        .unwrap();

    assert_eq!(report.applied_ops, 200);
    assert_eq!(fresh.plan_store.len(), 200);
    // Derived state for the replayed window matches the origin.
    for task in ["task-8", "task-9"] {
        let origin_view = origin.plan_store.task(task).unwrap();
        let fresh_view = fresh.plan_store.task(task).unwrap();
        assert_eq!(origin_view.state, fresh_view.state);
        assert_eq!(origin_view.annotations, fresh_view.annotations);
    }

    origin.stop().await;
    fresh.stop().await;
}

#[tokio::test]
async fn test_pruning_preserves_retrievability_via_node() {
    let swarm = swarm(1).await;
    let node = &swarm.nodes[0];

    // Ops in epoch 0, then advance the epoch far enough that sealing
    // archives them.
    let ops: Vec<PlanOp> = (1..=20).map(|l| probe_op(l, 1, "task-a")).collect();
    for op in &ops {
        node.plan_store.append(op.clone()).unwrap();
    }
    node.plan_store.set_epoch(15);
    let signed = node.seal_epoch().unwrap();
    assert_eq!(signed.checkpoint.epoch, 15);

    // keep_epochs = 10, current = 16 → epoch-1 ops were archived.
    for op in &ops {
        assert!(!node.plan_store.contains(&op.op_id));
        assert_eq!(node.get_op(&op.op_id).as_ref(), Some(op));
    }

    node.stop().await;
}
