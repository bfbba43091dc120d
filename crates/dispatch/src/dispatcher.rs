// Path: crates/dispatch/src/dispatcher.rs

//! The dispatcher: verify, observe, gate, then route by verb.

use crate::context::HandlerContext;
use crate::handlers;
use std::sync::Arc;
use swarm_plan::envelope::verify_envelope;
use swarm_types::envelope::{Envelope, VerbKind};
use swarm_types::error::{DispatchError, ErrorCode};
use tracing::{debug, warn};

pub struct Dispatcher {
    ctx: Arc<HandlerContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<HandlerContext> {
        &self.ctx
    }

    /// Full ingress path for an envelope off the wire: signature and
    /// payload-hash verification, Lamport observation, the ingress policy
    /// gate, then the verb handler. Invalid envelopes are dropped with a
    /// warning.
    pub async fn handle_incoming(&self, envelope: &Envelope) -> Result<(), DispatchError> {
        if let Err(e) = verify_envelope(envelope) {
            warn!(
                target: "dispatch",
                envelope = %envelope.id,
                kind = %envelope.kind,
                code = e.code(),
                "dropping invalid envelope: {}",
                e
            );
            return Err(e.into());
        }
        self.ctx.factory.observe(envelope);

        let decision = self.ctx.gates.ingress_validate(envelope);
        if !decision.allowed {
            let reason = decision.reason.unwrap_or_else(|| "denied".to_string());
            warn!(
                target: "dispatch",
                envelope = %envelope.id,
                kind = %envelope.kind,
                gas = decision.gas_used,
                "ingress gate denied envelope: {}",
                reason
            );
            return Err(DispatchError::PolicyDenied {
                gate: "ingress",
                reason,
            });
        }

        self.dispatch(envelope).await
    }

    /// Route a validated envelope to its handler. The verb set is closed;
    /// reserved kinds log and drop.
    pub async fn dispatch(&self, envelope: &Envelope) -> Result<(), DispatchError> {
        let ctx = &self.ctx;
        match envelope.kind {
            VerbKind::Need => handlers::need::handle(ctx, envelope).await,
            VerbKind::Propose => handlers::propose::handle(ctx, envelope).await,
            VerbKind::ProposeExtended => handlers::propose::handle_extended(ctx, envelope).await,
            VerbKind::Attest => handlers::attest::handle(ctx, envelope).await,
            VerbKind::AttestPlan => handlers::attest_plan::handle(ctx, envelope).await,
            VerbKind::Decide => handlers::decide::handle(ctx, envelope).await,
            VerbKind::Claim => handlers::claim::handle(ctx, envelope).await,
            VerbKind::ClaimExtended => handlers::claim::handle_extended(ctx, envelope).await,
            VerbKind::Heartbeat => handlers::heartbeat::handle(ctx, envelope).await,
            VerbKind::Commit => handlers::commit::handle(ctx, envelope).await,
            VerbKind::Finalize => handlers::finalize::handle(ctx, envelope).await,
            VerbKind::Yield => handlers::yield_release::handle_yield(ctx, envelope).await,
            VerbKind::Release => handlers::yield_release::handle_release(ctx, envelope).await,
            VerbKind::UpdatePlan => handlers::update_plan::handle(ctx, envelope).await,
            VerbKind::Challenge
            | VerbKind::Invalidate
            | VerbKind::Reconcile
            | VerbKind::Checkpoint => {
                debug!(target: "dispatch", kind = %envelope.kind, "reserved kind has no handler");
                Ok(())
            }
        }
    }
}
