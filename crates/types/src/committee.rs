// Path: crates/types/src/committee.rs

//! Committee records: verifier manifests, attestations, and the global
//! per-NEED decide record.

use crate::codec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attestation verdict. Only `Approve` counts toward quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// A verifier's vote on a proposal. Each `(need_id, proposal_id,
/// verifier_id)` triple is unique; double votes are rejected upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationRecord {
    pub need_id: String,
    pub proposal_id: String,
    pub verifier_id: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub telemetry: Value,
}

/// The global, at-most-one-per-NEED decision record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecideRecord {
    pub need_id: String,
    pub proposal_id: String,
    pub epoch: u64,
    pub lamport: u64,
    pub k_plan: usize,
    pub decider_id: String,
    pub timestamp_ns: u64,
}

/// Placement metadata used by the diversity-constrained selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierMetadata {
    pub org_id: String,
    pub asn: String,
    pub region: String,
    /// Reputation in `[0, 1]`, DID-portable via signed manifests.
    pub reputation: f64,
}

/// A staked verifier's signed manifest, keyed by DID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierManifest {
    /// DID of the verifier.
    pub verifier_id: String,
    pub stake: u64,
    pub capabilities: Vec<String>,
    pub metadata: VerifierMetadata,
    /// Hex-encoded Ed25519 public key the manifest is signed with.
    #[serde(with = "crate::codec::hex_bytes")]
    pub pubkey: Vec<u8>,
    pub registered_at_ns: u64,
    pub active: bool,
    /// Hex-encoded signature over `compute_hash()`; empty until signed.
    #[serde(default)]
    pub signature: String,
}

impl VerifierManifest {
    /// Deterministic hash of the manifest minus its signature. This is the
    /// preimage verifier keys sign.
    pub fn compute_hash(&self) -> Result<String, String> {
        let mut unsigned = self.clone();
        unsigned.signature = String::new();
        codec::hash_canonical(&unsigned)
    }
}

/// Diversity caps applied during committee selection, each the maximum
/// fraction of the committee one org/ASN/region may occupy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiversityConstraints {
    pub max_org_frac: f64,
    pub max_asn_frac: f64,
    pub max_region_frac: f64,
}

impl Default for DiversityConstraints {
    fn default() -> Self {
        Self {
            max_org_frac: 0.30,
            max_asn_frac: 0.40,
            max_region_frac: 0.50,
        }
    }
}

/// Events that move a verifier's reputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationEvent {
    /// Attestation proven wrong by a successful challenge: -0.3.
    FailedAttestation,
    /// Successful challenge raised by the verifier: +0.1.
    SuccessfulChallenge,
}
