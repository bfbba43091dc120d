// Path: crates/policy/src/gates.rs

//! The three enforcement points: preflight, ingress, and the commit gate.

use crate::engine::{PolicyEngine, PolicyInput};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use swarm_types::codec;
use swarm_types::envelope::Envelope;
use tracing::{debug, info};

/// Margin by which actual resource usage may exceed the claim before the
/// commit gate flags a violation.
const RESOURCE_MARGIN: f64 = 1.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyGate {
    /// Caller-side, before publish. Cheap rules plus a decision cache.
    Preflight,
    /// Receiver-side, before dispatch. Full gas-metered evaluation.
    Ingress,
    /// Verifier-side, inside the ATTEST handler. Full evaluation plus
    /// claimed-vs-actual resource comparison.
    CommitGate,
}

impl PolicyGate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Ingress => "ingress",
            Self::CommitGate => "commit_gate",
        }
    }
}

/// Outcome of one gate check.
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub gate: PolicyGate,
    pub reason: Option<String>,
    pub gas_used: u64,
    pub policy_hash: String,
}

/// Enforces the three gates against one policy engine.
pub struct GateEnforcer {
    engine: Arc<PolicyEngine>,
    /// Preflight cache keyed by (operation, agent_id).
    preflight_cache: Mutex<HashMap<(String, String), PolicyDecision>>,
}

impl GateEnforcer {
    pub fn new(engine: Arc<PolicyEngine>) -> Self {
        Self {
            engine,
            preflight_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy_hash(&self) -> &str {
        self.engine.policy_hash()
    }

    fn input_for(&self, envelope: &Envelope, gate: PolicyGate) -> PolicyInput {
        PolicyInput {
            gate: gate.as_str(),
            operation: envelope.kind.as_str().to_string(),
            kind: envelope.kind.as_str().to_string(),
            agent_id: envelope.actor_id(),
            thread_id: envelope.thread_id.clone(),
            payload: envelope.payload.clone(),
            payload_size: codec::canonical_size(&envelope.payload),
            lamport: envelope.lamport,
            signature_present: envelope.sig.is_some(),
            ts_ns: envelope.ts_ns,
        }
    }

    /// Caller-side check before publishing. Decisions are cached by
    /// (operation, agent_id); preflight burns no gas.
    pub fn preflight_validate(&self, envelope: &Envelope) -> PolicyDecision {
        let key = (envelope.kind.as_str().to_string(), envelope.actor_id());
        if let Ok(cache) = self.preflight_cache.lock() {
            if let Some(cached) = cache.get(&key) {
                debug!(target: "policy", kind = %envelope.kind, "preflight cache hit");
                return cached.clone();
            }
        }

        let input = self.input_for(envelope, PolicyGate::Preflight);
        let result = self.engine.evaluate(&input);
        let decision = PolicyDecision {
            allowed: result.allowed,
            gate: PolicyGate::Preflight,
            reason: result.reasons.into_iter().next(),
            gas_used: 0,
            policy_hash: self.engine.policy_hash().to_string(),
        };

        if let Ok(mut cache) = self.preflight_cache.lock() {
            cache.insert(key, decision.clone());
        }
        decision
    }

    /// Receiver-side check on every envelope before dispatch.
    pub fn ingress_validate(&self, envelope: &Envelope) -> PolicyDecision {
        let input = self.input_for(envelope, PolicyGate::Ingress);
        let result = self.engine.evaluate(&input);
        let decision = PolicyDecision {
            allowed: result.allowed,
            gate: PolicyGate::Ingress,
            reason: result.reasons.into_iter().next(),
            gas_used: result.gas_used,
            policy_hash: self.engine.policy_hash().to_string(),
        };
        debug!(
            target: "policy",
            kind = %envelope.kind,
            allowed = decision.allowed,
            gas = decision.gas_used,
            "ingress validation"
        );
        decision
    }

    /// Verifier-side check comparing claimed resources against telemetry.
    /// A resource violation forces denial even when the base policy
    /// accepts.
    pub fn commit_gate_validate(&self, envelope: &Envelope, telemetry: &Value) -> PolicyDecision {
        let input = self.input_for(envelope, PolicyGate::CommitGate);
        let result = self.engine.evaluate(&input);

        let violations = check_resource_violations(&envelope.payload, telemetry);
        let allowed = result.allowed && violations.is_none();
        let reason = match (result.reasons.into_iter().next(), violations) {
            (Some(r), Some(v)) => Some(format!("{}; violations: {}", r, v)),
            (None, Some(v)) => Some(format!("violations: {}", v)),
            (r, None) => r,
        };

        let decision = PolicyDecision {
            allowed,
            gate: PolicyGate::CommitGate,
            reason,
            gas_used: result.gas_used,
            policy_hash: self.engine.policy_hash().to_string(),
        };
        info!(
            target: "policy",
            kind = %envelope.kind,
            allowed = decision.allowed,
            gas = decision.gas_used,
            "commit gate validation"
        );
        decision
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.preflight_cache.lock() {
            cache.clear();
        }
    }
}

fn claimed(resources: &Value, key: &str) -> f64 {
    resources.get(key).and_then(Value::as_f64).unwrap_or(f64::INFINITY)
}

fn actual(resources: &Value, key: &str) -> f64 {
    resources.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Compare `payload.resources.{cpu_ms, memory_mb, gas}` to the telemetry
/// actuals, allowing the 10% margin.
fn check_resource_violations(payload: &Value, telemetry: &Value) -> Option<String> {
    let claimed_res = payload.get("resources").cloned().unwrap_or(Value::Null);
    let actual_res = telemetry.get("resources").cloned().unwrap_or(Value::Null);

    let mut violations = Vec::new();
    for (key, unit) in [("cpu_ms", "ms"), ("memory_mb", "MB"), ("gas", "")] {
        let claim = claimed(&claimed_res, key);
        let used = actual(&actual_res, key);
        if used > claim * RESOURCE_MARGIN {
            violations.push(format!(
                "{} exceeded: claimed {}{}, actual {}{}",
                key, claim, unit, used, unit
            ));
        }
    }

    if violations.is_empty() {
        None
    } else {
        Some(violations.join("; "))
    }
}
