// Path: crates/policy/src/engine.rs

//! The base policy engine: a pure, gas-metered evaluation of one envelope
//! against the ruleset.

use crate::gas::GasMeter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use swarm_types::codec;
use swarm_types::envelope::VerbKind;

/// Reason string recorded when an evaluation runs out of gas.
pub const REASON_GAS_EXCEEDED: &str = "gas_exceeded";

/// The serializable ruleset. Its canonical hash is the `policy_hash`
/// recorded with every decision and checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRuleset {
    pub version: String,
    /// Allowed message kinds: the closed verb set plus reserved kinds.
    pub allowed_kinds: BTreeSet<String>,
    /// Maximum canonical payload size in bytes.
    pub max_payload_bytes: usize,
}

impl Default for PolicyRuleset {
    fn default() -> Self {
        let allowed_kinds = [
            VerbKind::Need,
            VerbKind::Propose,
            VerbKind::ProposeExtended,
            VerbKind::Claim,
            VerbKind::ClaimExtended,
            VerbKind::Commit,
            VerbKind::Attest,
            VerbKind::AttestPlan,
            VerbKind::Decide,
            VerbKind::Finalize,
            VerbKind::Yield,
            VerbKind::Release,
            VerbKind::UpdatePlan,
            VerbKind::Heartbeat,
            VerbKind::Challenge,
            VerbKind::Invalidate,
            VerbKind::Reconcile,
            VerbKind::Checkpoint,
        ]
        .iter()
        .map(|k| k.as_str().to_string())
        .collect();
        Self {
            version: "1.0.0".to_string(),
            allowed_kinds,
            max_payload_bytes: 1_048_576,
        }
    }
}

impl PolicyRuleset {
    /// SHA-256 of the canonical serialized ruleset.
    pub fn hash(&self) -> String {
        codec::hash_canonical(self).unwrap_or_default()
    }
}

/// What one evaluation sees: a projection of the envelope at a gate.
#[derive(Debug, Clone)]
pub struct PolicyInput {
    pub gate: &'static str,
    pub operation: String,
    pub kind: String,
    pub agent_id: String,
    pub thread_id: String,
    pub payload: Value,
    pub payload_size: usize,
    pub lamport: u64,
    pub signature_present: bool,
    pub ts_ns: u64,
}

/// Result of one evaluation.
#[derive(Debug, Clone)]
pub struct PolicyResult {
    pub allowed: bool,
    pub reasons: Vec<String>,
    pub gas_used: u64,
    pub policy_version: String,
}

/// Evaluates envelopes against the ruleset. Pure: same input, same
/// ruleset, same result.
pub struct PolicyEngine {
    ruleset: PolicyRuleset,
    policy_hash: String,
    gas_limit: u64,
}

impl PolicyEngine {
    pub fn new(ruleset: PolicyRuleset, gas_limit: u64) -> Self {
        let policy_hash = ruleset.hash();
        Self {
            ruleset,
            policy_hash,
            gas_limit,
        }
    }

    pub fn policy_hash(&self) -> &str {
        &self.policy_hash
    }

    pub fn ruleset(&self) -> &PolicyRuleset {
        &self.ruleset
    }

    /// Run the base rules under a fresh gas meter. Running out of gas is a
    /// denial, never a crash.
    pub fn evaluate(&self, input: &PolicyInput) -> PolicyResult {
        let mut meter = GasMeter::new(self.gas_limit);
        match self.evaluate_metered(input, &mut meter) {
            Ok(result) => result,
            Err(_) => PolicyResult {
                allowed: false,
                reasons: vec![REASON_GAS_EXCEEDED.to_string()],
                gas_used: meter.used(),
                policy_version: self.ruleset.version.clone(),
            },
        }
    }

    fn evaluate_metered(
        &self,
        input: &PolicyInput,
        meter: &mut GasMeter,
    ) -> Result<PolicyResult, crate::gas::GasExceeded> {
        let mut reasons = Vec::new();
        let mut allowed = true;

        meter.function_call()?;

        // Kind must be in the closed set.
        meter.field_access()?;
        meter.set_membership()?;
        if !self.ruleset.allowed_kinds.contains(&input.kind) {
            allowed = false;
            reasons.push(format!("invalid message kind: {}", input.kind));
        }

        // Payload size cap.
        meter.field_access()?;
        meter.comparison()?;
        if input.payload_size >= self.ruleset.max_payload_bytes {
            allowed = false;
            reasons.push(format!(
                "payload too large: {} bytes (max: {})",
                input.payload_size, self.ruleset.max_payload_bytes
            ));
        }

        // Required envelope fields.
        meter.iteration(4)?;
        meter.field_access()?;
        if input.thread_id.is_empty() {
            allowed = false;
            reasons.push("missing required field: thread_id".to_string());
        }
        meter.field_access()?;
        meter.comparison()?;
        if input.lamport == 0 {
            allowed = false;
            reasons.push("missing required field: lamport".to_string());
        }
        meter.field_access()?;
        if input.agent_id.is_empty() {
            allowed = false;
            reasons.push("missing required field: agent_id".to_string());
        }
        meter.field_access()?;
        if input.kind.is_empty() {
            allowed = false;
            reasons.push("missing required field: kind".to_string());
        }

        if allowed {
            reasons.push("envelope passes all policy checks".to_string());
        }

        Ok(PolicyResult {
            allowed,
            reasons,
            gas_used: meter.used(),
            policy_version: self.ruleset.version.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(kind: &str, payload_size: usize) -> PolicyInput {
        PolicyInput {
            gate: "ingress",
            operation: kind.to_string(),
            kind: kind.to_string(),
            agent_id: "aa".to_string(),
            thread_id: "t1".to_string(),
            payload: json!({}),
            payload_size,
            lamport: 1,
            signature_present: true,
            ts_ns: 1,
        }
    }

    #[test]
    fn test_valid_envelope_passes() {
        let engine = PolicyEngine::new(PolicyRuleset::default(), 100_000);
        let result = engine.evaluate(&input("NEED", 100));
        assert!(result.allowed);
        assert!(result.gas_used > 0);
    }

    #[test]
    fn test_unknown_kind_denied() {
        let engine = PolicyEngine::new(PolicyRuleset::default(), 100_000);
        let result = engine.evaluate(&input("GOSSIP_SPAM", 100));
        assert!(!result.allowed);
        assert!(result.reasons[0].contains("invalid message kind"));
    }

    #[test]
    fn test_oversized_payload_denied() {
        let engine = PolicyEngine::new(PolicyRuleset::default(), 100_000);
        let result = engine.evaluate(&input("NEED", 2 * 1_048_576));
        assert!(!result.allowed);
        assert!(result.reasons[0].contains("payload too large"));
    }

    #[test]
    fn test_missing_fields_denied() {
        let engine = PolicyEngine::new(PolicyRuleset::default(), 100_000);
        let mut i = input("NEED", 10);
        i.thread_id = String::new();
        i.lamport = 0;
        let result = engine.evaluate(&i);
        assert!(!result.allowed);
        assert_eq!(result.reasons.len(), 2);
    }

    #[test]
    fn test_gas_exhaustion_is_a_denial_not_a_crash() {
        let engine = PolicyEngine::new(PolicyRuleset::default(), 5);
        let result = engine.evaluate(&input("NEED", 10));
        assert!(!result.allowed);
        assert_eq!(result.reasons, vec![REASON_GAS_EXCEEDED.to_string()]);
        assert!(result.gas_used > 5);
    }

    #[test]
    fn test_policy_hash_tracks_ruleset() {
        let a = PolicyRuleset::default();
        let mut b = PolicyRuleset::default();
        assert_eq!(a.hash(), b.hash());
        b.max_payload_bytes = 1;
        assert_ne!(a.hash(), b.hash());
    }
}
