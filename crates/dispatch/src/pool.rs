// Path: crates/dispatch/src/pool.rs

//! Per-thread serialized dispatch.
//!
//! Envelopes enter one bounded queue; a router fans them out to one FIFO
//! per thread_id, each drained by its own task. Within a thread, handlers
//! therefore run one at a time in arrival order; across threads they run
//! concurrently. The bounded queues are the backpressure surface: a full
//! queue delays the gossip receiver, which the substrate sees as delayed
//! acks.

use crate::dispatcher::Dispatcher;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swarm_types::envelope::Envelope;
use swarm_types::error::{DispatchError, ErrorCode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const PER_THREAD_DEPTH: usize = 64;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DispatchPool {
    sender: Mutex<Option<mpsc::Sender<Envelope>>>,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchPool {
    /// Start the router and return the pool handle.
    pub fn start(dispatcher: Arc<Dispatcher>, queue_depth: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Envelope>(queue_depth.max(1));

        let router = tokio::spawn(async move {
            let mut threads: HashMap<String, mpsc::Sender<Envelope>> = HashMap::new();
            let mut workers: Vec<JoinHandle<()>> = Vec::new();

            while let Some(envelope) = receiver.recv().await {
                let thread_id = envelope.thread_id.clone();
                let slot = threads.entry(thread_id.clone()).or_insert_with(|| {
                    let (tx, mut rx) = mpsc::channel::<Envelope>(PER_THREAD_DEPTH);
                    let dispatcher = Arc::clone(&dispatcher);
                    debug!(target: "dispatch", thread = %thread_id, "spawning thread worker");
                    workers.push(tokio::spawn(async move {
                        while let Some(envelope) = rx.recv().await {
                            // Handler errors are logged and the worker
                            // moves on; nothing escapes the loop.
                            if let Err(e) = dispatcher.handle_incoming(&envelope).await {
                                warn!(
                                    target: "dispatch",
                                    envelope = %envelope.id,
                                    kind = %envelope.kind,
                                    code = e.code(),
                                    "handler error: {}",
                                    e
                                );
                            }
                        }
                    }));
                    tx
                });
                if slot.send(envelope).await.is_err() {
                    warn!(target: "dispatch", "thread worker gone; dropping envelope");
                }
            }

            // Central queue closed: drop per-thread senders so workers
            // drain their FIFOs and exit.
            drop(threads);
            for worker in workers {
                let _ = worker.await;
            }
            info!(target: "dispatch", "dispatch pool drained");
        });

        Self {
            sender: Mutex::new(Some(sender)),
            router: Mutex::new(Some(router)),
        }
    }

    /// Enqueue an envelope. Blocks when the queue is full (backpressure).
    pub async fn submit(&self, envelope: Envelope) -> Result<(), DispatchError> {
        let sender = {
            let guard = self
                .sender
                .lock()
                .map_err(|_| DispatchError::Resource("dispatch pool lock poisoned".into()))?;
            guard
                .clone()
                .ok_or_else(|| DispatchError::Resource("dispatch pool is shut down".into()))?
        };
        sender
            .send(envelope)
            .await
            .map_err(|_| DispatchError::Resource("dispatch pool is shut down".into()))
    }

    /// Stop accepting envelopes and drain inflight work, bounded by the
    /// drain timeout.
    pub async fn shutdown(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
        let router = match self.router.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(router) = router {
            if tokio::time::timeout(DRAIN_TIMEOUT, router).await.is_err() {
                warn!(target: "dispatch", "dispatch pool drain timed out");
            }
        }
    }
}
