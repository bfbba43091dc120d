// Path: crates/plan/src/envelope.rs

//! Envelope construction, signing, and verification.

use crate::lamport::LamportClock;
use serde_json::Value;
use std::sync::Arc;
use swarm_crypto::sign::{verify_detached, Ed25519KeyPair};
use swarm_types::codec;
use swarm_types::envelope::{Envelope, VerbKind, ENVELOPE_VERSION};
use swarm_types::error::EnvelopeError;
use swarm_types::time::now_ns;
use uuid::Uuid;

/// Builds and signs envelopes against one identity and one Lamport clock.
///
/// One factory per node process; handlers that emit downstream envelopes
/// borrow it by handle.
pub struct EnvelopeFactory {
    clock: Arc<LamportClock>,
    keypair: Arc<Ed25519KeyPair>,
    policy_engine_hash: String,
}

impl EnvelopeFactory {
    pub fn new(
        clock: Arc<LamportClock>,
        keypair: Arc<Ed25519KeyPair>,
        policy_engine_hash: impl Into<String>,
    ) -> Self {
        Self {
            clock,
            keypair,
            policy_engine_hash: policy_engine_hash.into(),
        }
    }

    pub fn clock(&self) -> &Arc<LamportClock> {
        &self.clock
    }

    /// Hex-encoded public key of this factory's identity.
    pub fn actor_id(&self) -> String {
        hex::encode(self.keypair.public_key().to_bytes())
    }

    /// Create a canonical, unsigned envelope. Ticks the Lamport clock and
    /// fills the payload hash.
    pub fn make(
        &self,
        kind: VerbKind,
        thread_id: impl Into<String>,
        payload: Value,
    ) -> Result<Envelope, EnvelopeError> {
        let payload_hash =
            codec::hash_canonical(&payload).map_err(EnvelopeError::Canonical)?;
        Ok(Envelope {
            version: ENVELOPE_VERSION,
            id: Uuid::new_v4(),
            thread_id: thread_id.into(),
            kind,
            lamport: self.clock.tick(),
            ts_ns: now_ns(),
            sender_pk: self.keypair.public_key().to_bytes(),
            payload,
            payload_hash,
            policy_engine_hash: self.policy_engine_hash.clone(),
            nonce: Uuid::new_v4(),
            sig_pk: None,
            sig: None,
        })
    }

    /// Sign an envelope with this factory's key. The signature covers the
    /// canonical serialization of everything except the signature fields.
    pub fn sign(&self, mut envelope: Envelope) -> Result<Envelope, EnvelopeError> {
        let bytes = envelope.signing_bytes()?;
        let signature = self.keypair.sign(&bytes);
        envelope.sig_pk = Some(self.keypair.public_key().to_bytes());
        envelope.sig = Some(signature.to_bytes());
        Ok(envelope)
    }

    /// `make` followed by `sign`.
    pub fn make_signed(
        &self,
        kind: VerbKind,
        thread_id: impl Into<String>,
        payload: Value,
    ) -> Result<Envelope, EnvelopeError> {
        self.sign(self.make(kind, thread_id, payload)?)
    }

    /// Merge a received envelope's Lamport value into the local clock.
    pub fn observe(&self, envelope: &Envelope) {
        if envelope.lamport > 0 {
            self.clock.observe(envelope.lamport);
        }
    }
}

/// Verify a received envelope: positive Lamport, payload hash, and the
/// Ed25519 signature over the canonical bytes. The signing key must match
/// the claimed sender. Callers drop failing envelopes and log at warn.
pub fn verify_envelope(envelope: &Envelope) -> Result<(), EnvelopeError> {
    if envelope.lamport == 0 {
        return Err(EnvelopeError::NonPositiveLamport);
    }
    if !envelope.payload_hash_valid() {
        return Err(EnvelopeError::PayloadHashMismatch);
    }
    let (sig_pk, sig) = match (&envelope.sig_pk, &envelope.sig) {
        (Some(pk), Some(sig)) => (pk, sig),
        _ => return Err(EnvelopeError::MissingSignature),
    };
    if *sig_pk != envelope.sender_pk {
        return Err(EnvelopeError::InvalidSignature);
    }
    let bytes = envelope.signing_bytes()?;
    verify_detached(sig_pk, &bytes, sig).map_err(|_| EnvelopeError::InvalidSignature)
}
