// Path: crates/node/src/main.rs
#![forbid(unsafe_code)]

use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use swarm_networking::{Gossip, GossipMesh};
use swarm_node::SwarmNode;
use swarm_types::config::{DecideBackend, NodeConfig};
use tracing::{error, info};

/// Exit codes: 0 clean shutdown, 1 unrecoverable config/init failure,
/// 2 external service unavailable at startup.
const EXIT_CONFIG: i32 = 1;
const EXIT_EXTERNAL: i32 = 2;

#[derive(Parser, Debug)]
#[clap(name = "swarm-node", about = "Swarm Kernel coordination node")]
struct Opts {
    /// Base directory for checkpoints, cold storage, and identity.
    #[clap(long, default_value = "./swarm-data")]
    state_dir: PathBuf,

    /// Gossip listen multiaddr.
    #[clap(long, default_value = "/ip4/0.0.0.0/tcp/0")]
    listen_addr: String,

    /// DECIDE backend: raft | cas.
    #[clap(long, default_value = "cas")]
    decide_backend: String,

    /// Active-verifier count below which the swarm runs in bootstrap mode.
    #[clap(long, default_value_t = 10)]
    bootstrap_threshold: usize,

    /// Target quorum size after bootstrap.
    #[clap(long, default_value_t = 5)]
    k_target: usize,

    /// Epochs kept hot before ops migrate to cold storage.
    #[clap(long, default_value_t = 10)]
    keep_epochs: u64,
}

fn config_from(opts: &Opts) -> Result<NodeConfig, String> {
    let mut config = NodeConfig {
        state_dir: opts.state_dir.clone(),
        listen_addr: opts.listen_addr.clone(),
        decide_backend: DecideBackend::from_str(&opts.decide_backend)?,
        ..NodeConfig::default()
    };
    config.quorum.bootstrap_threshold = opts.bootstrap_threshold;
    config.quorum.k_target = opts.k_target;
    config.checkpoint.keep_epochs = opts.keep_epochs;
    Ok(config)
}

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    if let Err(e) = swarm_telemetry::init::init_tracing() {
        eprintln!("failed to initialize tracing: {}", e);
    }

    let opts = Opts::parse();
    let config = match config_from(&opts) {
        Ok(config) => config,
        Err(e) => {
            error!(target: "node", "invalid configuration: {}", e);
            return EXIT_CONFIG;
        }
    };

    // Single-process substrate; a networked deployment plugs its pubsub
    // transport in behind the same trait.
    let mesh = GossipMesh::new();
    let gossip: Arc<dyn Gossip> = Arc::new(mesh.join("local"));

    let node = match SwarmNode::start(config.clone(), gossip).await {
        Ok(node) => node,
        Err(e) => {
            error!(target: "node", "startup failed: {:#}", e);
            // A coordinator that cannot come up is an external-service
            // failure; everything else is config/init.
            let external = e
                .downcast_ref::<swarm_types::error::DecideError>()
                .is_some();
            return if external { EXIT_EXTERNAL } else { EXIT_CONFIG };
        }
    };

    let epoch_interval = config.checkpoint.epoch_interval_secs;
    info!(
        target: "node",
        epoch_interval_secs = epoch_interval,
        "epoch scheduler active"
    );
    let mut ticker =
        tokio::time::interval(std::time::Duration::from_secs(epoch_interval.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match node.seal_epoch() {
                    Ok(signed) => info!(
                        target: "node",
                        epoch = signed.checkpoint.epoch,
                        ops = signed.checkpoint.op_count,
                        "epoch sealed"
                    ),
                    Err(e) => error!(target: "node", "epoch seal failed: {:#}", e),
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(target: "node", "signal handler failed: {}", e);
                }
                info!(target: "node", "shutdown requested");
                break;
            }
        }
    }

    node.stop().await;
    0
}
