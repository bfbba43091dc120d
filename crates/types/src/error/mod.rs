// Path: crates/types/src/error/mod.rs
//! Core error types for the Swarm Kernel.

use thiserror::Error;
use uuid::Uuid;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors from envelope construction and verification.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope's Lamport value was zero or missing.
    #[error("Envelope lamport must be strictly positive")]
    NonPositiveLamport,
    /// The recorded payload hash does not match the canonical payload bytes.
    #[error("Payload hash mismatch")]
    PayloadHashMismatch,
    /// The Ed25519 signature failed verification.
    #[error("Invalid envelope signature")]
    InvalidSignature,
    /// The envelope carries no signature to verify.
    #[error("Envelope is unsigned")]
    MissingSignature,
    /// Canonical serialization of the envelope failed.
    #[error("Canonicalization failed: {0}")]
    Canonical(String),
}

impl ErrorCode for EnvelopeError {
    fn code(&self) -> &'static str {
        match self {
            Self::NonPositiveLamport => "ENVELOPE_NON_POSITIVE_LAMPORT",
            Self::PayloadHashMismatch => "ENVELOPE_PAYLOAD_HASH_MISMATCH",
            Self::InvalidSignature => "ENVELOPE_INVALID_SIGNATURE",
            Self::MissingSignature => "ENVELOPE_MISSING_SIGNATURE",
            Self::Canonical(_) => "ENVELOPE_CANONICAL_FAILED",
        }
    }
}

/// Errors from cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The signature failed cryptographic verification.
    #[error("Signature verification failed")]
    VerificationFailed,
    /// The provided key material is malformed.
    #[error("Invalid cryptographic key: {0}")]
    InvalidKey(String),
    /// The provided signature material is malformed.
    #[error("Invalid signature format: {0}")]
    InvalidSignature(String),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::VerificationFailed => "CRYPTO_VERIFICATION_FAILED",
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::InvalidSignature(_) => "CRYPTO_INVALID_SIGNATURE",
        }
    }
}

/// Errors from the plan store.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Persisting an op to the write-ahead log failed.
    #[error("Op-log IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Serializing or deserializing an op failed.
    #[error("Op serialization error: {0}")]
    Serialization(String),
    /// The op-log write lock was poisoned by a panicking writer.
    #[error("Op-log lock poisoned")]
    LockPoisoned,
}

impl ErrorCode for PlanError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "PLAN_IO_ERROR",
            Self::Serialization(_) => "PLAN_SERIALIZATION_ERROR",
            Self::LockPoisoned => "PLAN_LOCK_POISONED",
        }
    }
}

/// Errors from the lease registry and heartbeat protocol.
#[derive(Debug, Error)]
pub enum LeaseError {
    /// The lease does not exist (expired, deleted, or never created).
    #[error("Lease not found: {0}")]
    NotFound(Uuid),
    /// The task already has an active lease.
    #[error("Task '{0}' already has an active lease")]
    TaskAlreadyLeased(String),
    /// The requested TTL is below the protocol minimum.
    #[error("Lease TTL {got}s below minimum {min}s")]
    TtlTooShort { got: u64, min: u64 },
    /// The heartbeat interval must be positive and shorter than the TTL.
    #[error("Invalid heartbeat interval {interval}s for TTL {ttl}s")]
    InvalidHeartbeatInterval { interval: u64, ttl: u64 },
    /// A heartbeat came from a worker that does not own the lease.
    #[error("Worker mismatch for lease: expected {expected}, got {got}")]
    WorkerMismatch { expected: String, got: String },
}

impl ErrorCode for LeaseError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "LEASE_NOT_FOUND",
            Self::TaskAlreadyLeased(_) => "LEASE_TASK_ALREADY_LEASED",
            Self::TtlTooShort { .. } => "LEASE_TTL_TOO_SHORT",
            Self::InvalidHeartbeatInterval { .. } => "LEASE_INVALID_HEARTBEAT_INTERVAL",
            Self::WorkerMismatch { .. } => "LEASE_WORKER_MISMATCH",
        }
    }
}

/// Errors from committee selection and the verifier pool.
#[derive(Debug, Error)]
pub enum CommitteeError {
    /// Fewer candidates meet `min_stake` than the committee size requires.
    #[error("Insufficient verifiers: need {needed}, have {available}")]
    InsufficientVerifiers { needed: usize, available: usize },
    /// The verifier is not registered in the pool.
    #[error("Unknown verifier: {0}")]
    UnknownVerifier(String),
    /// The verifier is registered but deactivated.
    #[error("Verifier is inactive: {0}")]
    InactiveVerifier(String),
    /// The verifier's stake is below the required minimum.
    #[error("Insufficient stake for {verifier_id}: {stake} < {min_stake}")]
    InsufficientStake {
        verifier_id: String,
        stake: u64,
        min_stake: u64,
    },
    /// The manifest's signature did not verify against its key.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    /// Diversity caps left no eligible candidate to fill the committee.
    #[error("Diversity constraints unsatisfiable for committee of {k}")]
    ConstraintsUnsatisfiable { k: usize },
}

impl ErrorCode for CommitteeError {
    fn code(&self) -> &'static str {
        match self {
            Self::InsufficientVerifiers { .. } => "COMMITTEE_INSUFFICIENT_VERIFIERS",
            Self::UnknownVerifier(_) => "COMMITTEE_UNKNOWN_VERIFIER",
            Self::InactiveVerifier(_) => "COMMITTEE_INACTIVE_VERIFIER",
            Self::InsufficientStake { .. } => "COMMITTEE_INSUFFICIENT_STAKE",
            Self::InvalidManifest(_) => "COMMITTEE_INVALID_MANIFEST",
            Self::ConstraintsUnsatisfiable { .. } => "COMMITTEE_CONSTRAINTS_UNSATISFIABLE",
        }
    }
}

/// Errors from the atomic DECIDE coordinator.
///
/// A lost race is not an error: `try_decide` returns `Ok(None)` on
/// conflict. These variants cover the coordinator being unusable.
#[derive(Debug, Error)]
pub enum DecideError {
    /// The backend store rejected the operation.
    #[error("Decide backend error: {0}")]
    Backend(String),
    /// The coordinator did not answer within the deadline. Callers retry
    /// later with the same inputs; the operation is idempotent.
    #[error("Decide coordinator timed out")]
    Timeout,
}

impl ErrorCode for DecideError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "DECIDE_BACKEND_ERROR",
            Self::Timeout => "DECIDE_TIMEOUT",
        }
    }
}

/// Errors from checkpoint creation, persistence, and loading.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Checkpoint serialization error: {0}")]
    Serialization(String),
    #[error("Compression error: {0}")]
    Compression(String),
    /// Not enough verifier signatures were gathered.
    #[error("Checkpoint signature quorum not met: {got}/{required}")]
    QuorumNotMet { got: usize, required: usize },
    /// No checkpoint exists for the requested epoch.
    #[error("Checkpoint not found for epoch {0}")]
    NotFound(u64),
}

impl ErrorCode for CheckpointError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "CHECKPOINT_IO_ERROR",
            Self::Serialization(_) => "CHECKPOINT_SERIALIZATION_ERROR",
            Self::Compression(_) => "CHECKPOINT_COMPRESSION_ERROR",
            Self::QuorumNotMet { .. } => "CHECKPOINT_QUORUM_NOT_MET",
            Self::NotFound(_) => "CHECKPOINT_NOT_FOUND",
        }
    }
}

/// Errors from fast-sync. Integrity failures abort the sync attempt and
/// leave the receiver in a clean partial state; it falls back to slow-sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No signed checkpoint is available to sync from.
    #[error("No checkpoint available for fast-sync")]
    NoCheckpoint,
    /// The checkpoint's signature set did not reach quorum.
    #[error("Checkpoint signature quorum failed: {got}/{required}")]
    SignatureQuorum { got: usize, required: usize },
    /// Replayed ops failed the continuity check.
    #[error("Continuity check failed: {0}")]
    Continuity(String),
    /// Applying replayed ops to the op-log failed.
    #[error("Replay failed: {0}")]
    Replay(#[from] PlanError),
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

impl ErrorCode for SyncError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoCheckpoint => "SYNC_NO_CHECKPOINT",
            Self::SignatureQuorum { .. } => "SYNC_SIGNATURE_QUORUM",
            Self::Continuity(_) => "SYNC_CONTINUITY_FAILED",
            Self::Replay(_) => "SYNC_REPLAY_FAILED",
            Self::Checkpoint(_) => "SYNC_CHECKPOINT_ERROR",
        }
    }
}

/// Errors surfaced by verb handlers to the dispatcher. The dispatcher logs
/// and continues; nothing escapes into the event loop.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The envelope failed validation and was dropped.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// The envelope's payload did not parse into the verb's typed form.
    #[error("Invalid payload for {kind}: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },
    /// A policy gate refused the envelope.
    #[error("Policy denied at {gate}: {reason}")]
    PolicyDenied { gate: &'static str, reason: String },
    /// A conflicting operation already exists (lost DECIDE race, duplicate
    /// ballot, duplicate attestation). No state change.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// An external collaborator was unavailable.
    #[error("Resource unavailable: {0}")]
    Resource(String),
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("Plan store error: {0}")]
    Plan(#[from] PlanError),
    #[error("Lease error: {0}")]
    Lease(#[from] LeaseError),
    #[error("Committee error: {0}")]
    Committee(#[from] CommitteeError),
    #[error("Decide error: {0}")]
    Decide(#[from] DecideError),
}

impl ErrorCode for DispatchError {
    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "DISPATCH_VALIDATION_FAILED",
            Self::InvalidPayload { .. } => "DISPATCH_INVALID_PAYLOAD",
            Self::PolicyDenied { .. } => "DISPATCH_POLICY_DENIED",
            Self::Conflict(_) => "DISPATCH_CONFLICT",
            Self::Resource(_) => "DISPATCH_RESOURCE_UNAVAILABLE",
            Self::Envelope(_) => "DISPATCH_ENVELOPE_ERROR",
            Self::Plan(_) => "DISPATCH_PLAN_ERROR",
            Self::Lease(_) => "DISPATCH_LEASE_ERROR",
            Self::Committee(_) => "DISPATCH_COMMITTEE_ERROR",
            Self::Decide(_) => "DISPATCH_DECIDE_ERROR",
        }
    }
}

/// Errors from the gossip substrate contract.
#[derive(Debug, Error)]
pub enum GossipError {
    /// The mesh has shut down and no longer accepts publishes.
    #[error("Gossip substrate closed")]
    Closed,
    /// Serializing an envelope for the wire failed.
    #[error("Gossip encode error: {0}")]
    Encode(String),
}

impl ErrorCode for GossipError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed => "GOSSIP_CLOSED",
            Self::Encode(_) => "GOSSIP_ENCODE_ERROR",
        }
    }
}

/// Errors from the content-addressable store.
#[derive(Debug, Error)]
pub enum CasError {
    /// The requested content id is not present.
    #[error("Content not found: {0}")]
    NotFound(String),
    #[error("CAS IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for CasError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "CAS_NOT_FOUND",
            Self::Io(_) => "CAS_IO_ERROR",
        }
    }
}

/// Errors from the credit ledger interface.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },
    #[error("Escrow not found: {0}")]
    EscrowNotFound(String),
}

impl ErrorCode for LedgerError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownAccount(_) => "LEDGER_UNKNOWN_ACCOUNT",
            Self::InsufficientFunds { .. } => "LEDGER_INSUFFICIENT_FUNDS",
            Self::EscrowNotFound(_) => "LEDGER_ESCROW_NOT_FOUND",
        }
    }
}
