// Path: crates/dispatch/src/release.rs

//! The lease monitor's outlet: build a system-signed RELEASE envelope,
//! publish it, and run it through the local dispatcher.

use crate::dispatcher::Dispatcher;
use async_trait::async_trait;
use std::sync::Arc;
use swarm_lease::ReleaseSink;
use swarm_types::envelope::VerbKind;
use swarm_types::error::ErrorCode;
use swarm_types::lease::{Lease, ReleaseReason};
use swarm_types::payload::ReleasePayload;
use tracing::{error, warn};

pub struct SystemReleaseSink {
    dispatcher: Arc<Dispatcher>,
}

impl SystemReleaseSink {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl ReleaseSink for SystemReleaseSink {
    async fn publish_release(&self, lease: &Lease, reason: ReleaseReason) {
        let ctx = self.dispatcher.context();
        let payload = match serde_json::to_value(ReleasePayload {
            task_id: lease.task_id.clone(),
            lease_id: lease.lease_id,
            reason,
        }) {
            Ok(payload) => payload,
            Err(e) => {
                error!(target: "lease", "failed to encode RELEASE payload: {}", e);
                return;
            }
        };

        let envelope = match ctx
            .factory
            .make_signed(VerbKind::Release, lease.thread_id.clone(), payload)
        {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(target: "lease", code = e.code(), "failed to build RELEASE envelope: {}", e);
                return;
            }
        };

        if let Err(e) = ctx.publish(&envelope).await {
            warn!(target: "lease", "failed to publish RELEASE envelope: {}", e);
        }
        // Apply locally as well; remote deliveries replay idempotently.
        if let Err(e) = self.dispatcher.handle_incoming(&envelope).await {
            warn!(target: "lease", code = e.code(), "local RELEASE dispatch failed: {}", e);
        }
    }
}
