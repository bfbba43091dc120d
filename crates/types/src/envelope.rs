// Path: crates/types/src/envelope.rs

//! The signed envelope: the wire unit every verb travels in.

use crate::codec::{self, hex_bytes, hex_bytes_opt};
use crate::error::EnvelopeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Current envelope wire version.
pub const ENVELOPE_VERSION: u32 = 1;

/// The closed set of protocol verbs.
///
/// CHALLENGE / INVALIDATE / RECONCILE / CHECKPOINT are reserved kinds that
/// pass policy but have no handler yet; the dispatcher logs and drops them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerbKind {
    Need,
    Propose,
    ProposeExtended,
    Claim,
    ClaimExtended,
    Commit,
    Attest,
    AttestPlan,
    Decide,
    Finalize,
    Yield,
    Release,
    UpdatePlan,
    Heartbeat,
    Challenge,
    Invalidate,
    Reconcile,
    Checkpoint,
}

impl VerbKind {
    /// Wire name of the verb (SCREAMING_SNAKE_CASE).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Need => "NEED",
            Self::Propose => "PROPOSE",
            Self::ProposeExtended => "PROPOSE_EXTENDED",
            Self::Claim => "CLAIM",
            Self::ClaimExtended => "CLAIM_EXTENDED",
            Self::Commit => "COMMIT",
            Self::Attest => "ATTEST",
            Self::AttestPlan => "ATTEST_PLAN",
            Self::Decide => "DECIDE",
            Self::Finalize => "FINALIZE",
            Self::Yield => "YIELD",
            Self::Release => "RELEASE",
            Self::UpdatePlan => "UPDATE_PLAN",
            Self::Heartbeat => "HEARTBEAT",
            Self::Challenge => "CHALLENGE",
            Self::Invalidate => "INVALIDATE",
            Self::Reconcile => "RECONCILE",
            Self::Checkpoint => "CHECKPOINT",
        }
    }

    /// Lowercased verb segment for gossip topics.
    pub fn topic_segment(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl std::fmt::Display for VerbKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical signed message.
///
/// The signature covers the canonical serialization of every field except
/// `sig_pk` and `sig`; `payload_hash` commits to the canonical bytes of
/// `payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    pub id: Uuid,
    pub thread_id: String,
    pub kind: VerbKind,
    pub lamport: u64,
    pub ts_ns: u64,
    #[serde(with = "hex_bytes")]
    pub sender_pk: Vec<u8>,
    pub payload: Value,
    pub payload_hash: String,
    pub policy_engine_hash: String,
    pub nonce: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_bytes_opt")]
    pub sig_pk: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_bytes_opt")]
    pub sig: Option<Vec<u8>>,
}

impl Envelope {
    /// Canonical bytes the signature covers: the envelope with the two
    /// signature fields stripped.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut value =
            serde_json::to_value(self).map_err(|e| EnvelopeError::Canonical(e.to_string()))?;
        if let Value::Object(map) = &mut value {
            map.remove("sig_pk");
            map.remove("sig");
        }
        serde_json::to_vec(&value).map_err(|e| EnvelopeError::Canonical(e.to_string()))
    }

    /// Recomputes the payload hash and compares it to the recorded one.
    pub fn payload_hash_valid(&self) -> bool {
        match codec::hash_canonical(&self.payload) {
            Ok(h) => h == self.payload_hash,
            Err(_) => false,
        }
    }

    /// Hex-encoded sender public key, used as actor id throughout the
    /// plan store.
    pub fn actor_id(&self) -> String {
        hex::encode(&self.sender_pk)
    }

    /// Gossip topic this envelope belongs on.
    pub fn topic(&self) -> String {
        format!(
            "/swarm/thread/{}/{}",
            self.thread_id,
            self.kind.topic_segment()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn probe_envelope() -> Envelope {
        let payload = json!({"task_type": "gen"});
        Envelope {
            version: ENVELOPE_VERSION,
            id: Uuid::new_v4(),
            thread_id: "t1".into(),
            kind: VerbKind::Need,
            lamport: 1,
            ts_ns: 1,
            sender_pk: vec![0xAA; 32],
            payload_hash: codec::hash_canonical(&payload).unwrap(),
            payload,
            policy_engine_hash: "abc".into(),
            nonce: Uuid::new_v4(),
            sig_pk: None,
            sig: None,
        }
    }

    #[test]
    fn test_verb_wire_names() {
        assert_eq!(
            serde_json::to_string(&VerbKind::AttestPlan).unwrap(),
            "\"ATTEST_PLAN\""
        );
        assert_eq!(VerbKind::UpdatePlan.topic_segment(), "update_plan");
    }

    #[test]
    fn test_signing_bytes_exclude_signature_fields() {
        let mut env = probe_envelope();
        let unsigned = env.signing_bytes().unwrap();
        env.sig_pk = Some(vec![1; 32]);
        env.sig = Some(vec![2; 64]);
        assert_eq!(unsigned, env.signing_bytes().unwrap());
    }

    #[test]
    fn test_payload_hash_check() {
        let mut env = probe_envelope();
        assert!(env.payload_hash_valid());
        env.payload = json!({"task_type": "tampered"});
        assert!(!env.payload_hash_valid());
    }

    #[test]
    fn test_topic_convention() {
        let env = probe_envelope();
        assert_eq!(env.topic(), "/swarm/thread/t1/need");
    }
}
