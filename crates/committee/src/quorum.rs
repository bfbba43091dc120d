// Path: crates/committee/src/quorum.rs

//! Attestation counting per (need, proposal).
//!
//! Only approvals enter the set; duplicates from the same verifier are
//! no-ops. `record` reports the threshold crossing exactly once (the
//! insert that brings the set to K), so the caller triggers DECIDE once
//! per proposal no matter how many approvals follow.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use tracing::debug;

#[derive(Default)]
pub struct QuorumTracker {
    approvals: Mutex<HashMap<(String, String), BTreeSet<String>>>,
}

impl QuorumTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an approval. Returns `true` iff this approval is new and
    /// brings the set to exactly `k_plan`.
    pub fn record(&self, need_id: &str, proposal_id: &str, verifier_id: &str, k_plan: usize) -> bool {
        let mut approvals = match self.approvals.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let set = approvals
            .entry((need_id.to_string(), proposal_id.to_string()))
            .or_default();
        let inserted = set.insert(verifier_id.to_string());
        let count = set.len();
        debug!(
            target: "committee",
            need = %need_id,
            proposal = %proposal_id,
            verifier = %verifier_id,
            count,
            k_plan,
            inserted,
            "attestation recorded"
        );
        inserted && count == k_plan
    }

    pub fn count(&self, need_id: &str, proposal_id: &str) -> usize {
        self.approvals
            .lock()
            .ok()
            .and_then(|a| {
                a.get(&(need_id.to_string(), proposal_id.to_string()))
                    .map(BTreeSet::len)
            })
            .unwrap_or(0)
    }

    pub fn has_quorum(&self, need_id: &str, proposal_id: &str, k_plan: usize) -> bool {
        self.count(need_id, proposal_id) >= k_plan
    }

    /// True if the verifier already approved this proposal.
    pub fn has_approved(&self, need_id: &str, proposal_id: &str, verifier_id: &str) -> bool {
        self.approvals
            .lock()
            .ok()
            .map(|a| {
                a.get(&(need_id.to_string(), proposal_id.to_string()))
                    .is_some_and(|set| set.contains(verifier_id))
            })
            .unwrap_or(false)
    }
}
