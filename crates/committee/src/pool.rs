// Path: crates/committee/src/pool.rs

//! Registry of staked verifier manifests, keyed by DID.

use std::collections::HashMap;
use std::sync::RwLock;
use swarm_crypto::sign::{verify_detached, Ed25519KeyPair};
use swarm_types::committee::VerifierManifest;
use swarm_types::error::CommitteeError;
use tracing::{debug, info};

#[derive(Default)]
pub struct VerifierPool {
    verifiers: RwLock<HashMap<String, VerifierManifest>>,
}

impl VerifierPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update a manifest. The signature must verify against
    /// the manifest's own key over its canonical hash.
    pub fn register(&self, manifest: VerifierManifest) -> Result<(), CommitteeError> {
        verify_manifest(&manifest)?;
        let mut verifiers = self
            .verifiers
            .write()
            .map_err(|_| CommitteeError::InvalidManifest("pool lock poisoned".into()))?;
        let updating = verifiers.contains_key(&manifest.verifier_id);
        info!(
            target: "committee",
            verifier = %manifest.verifier_id,
            stake = manifest.stake,
            updating,
            "registered verifier manifest"
        );
        verifiers.insert(manifest.verifier_id.clone(), manifest);
        Ok(())
    }

    pub fn get(&self, verifier_id: &str) -> Option<VerifierManifest> {
        self.verifiers.read().ok()?.get(verifier_id).cloned()
    }

    pub fn activate(&self, verifier_id: &str) -> Result<(), CommitteeError> {
        self.set_active(verifier_id, true)
    }

    pub fn deactivate(&self, verifier_id: &str) -> Result<(), CommitteeError> {
        self.set_active(verifier_id, false)
    }

    fn set_active(&self, verifier_id: &str, active: bool) -> Result<(), CommitteeError> {
        let mut verifiers = self
            .verifiers
            .write()
            .map_err(|_| CommitteeError::InvalidManifest("pool lock poisoned".into()))?;
        let manifest = verifiers
            .get_mut(verifier_id)
            .ok_or_else(|| CommitteeError::UnknownVerifier(verifier_id.to_string()))?;
        manifest.active = active;
        debug!(target: "committee", verifier = %verifier_id, active, "verifier activation changed");
        Ok(())
    }

    /// Active verifiers meeting the stake floor, in DID order.
    pub fn active_verifiers(&self, min_stake: u64) -> Vec<VerifierManifest> {
        let mut list: Vec<VerifierManifest> = self
            .verifiers
            .read()
            .map(|v| {
                v.values()
                    .filter(|m| m.active && m.stake >= min_stake)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        list.sort_by(|a, b| a.verifier_id.cmp(&b.verifier_id));
        list
    }

    pub fn active_count(&self, min_stake: u64) -> usize {
        self.verifiers
            .read()
            .map(|v| {
                v.values()
                    .filter(|m| m.active && m.stake >= min_stake)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Check a sender is an active pool member with sufficient stake; the
    /// ATTEST_PLAN handler gates on this.
    pub fn check_eligible(&self, verifier_id: &str, min_stake: u64) -> Result<(), CommitteeError> {
        let manifest = self
            .get(verifier_id)
            .ok_or_else(|| CommitteeError::UnknownVerifier(verifier_id.to_string()))?;
        if !manifest.active {
            return Err(CommitteeError::InactiveVerifier(verifier_id.to_string()));
        }
        if manifest.stake < min_stake {
            return Err(CommitteeError::InsufficientStake {
                verifier_id: verifier_id.to_string(),
                stake: manifest.stake,
                min_stake,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.verifiers.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sign a manifest with the key it claims; used at registration time by
/// the verifier itself.
pub fn sign_manifest(
    keypair: &Ed25519KeyPair,
    mut manifest: VerifierManifest,
) -> Result<VerifierManifest, CommitteeError> {
    manifest.pubkey = keypair.public_key().to_bytes();
    let hash = manifest
        .compute_hash()
        .map_err(CommitteeError::InvalidManifest)?;
    manifest.signature = hex::encode(keypair.sign(hash.as_bytes()).to_bytes());
    Ok(manifest)
}

fn verify_manifest(manifest: &VerifierManifest) -> Result<(), CommitteeError> {
    if manifest.signature.is_empty() {
        return Err(CommitteeError::InvalidManifest(
            "manifest is unsigned".to_string(),
        ));
    }
    let hash = manifest
        .compute_hash()
        .map_err(CommitteeError::InvalidManifest)?;
    let signature = hex::decode(&manifest.signature)
        .map_err(|e| CommitteeError::InvalidManifest(format!("bad signature hex: {}", e)))?;
    verify_detached(&manifest.pubkey, hash.as_bytes(), &signature)
        .map_err(|e| CommitteeError::InvalidManifest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_types::committee::VerifierMetadata;

    pub(crate) fn signed_manifest(id: &str, stake: u64) -> VerifierManifest {
        let kp = Ed25519KeyPair::generate();
        let manifest = VerifierManifest {
            verifier_id: id.to_string(),
            stake,
            capabilities: vec!["attest".into()],
            metadata: VerifierMetadata {
                org_id: "org_a".into(),
                asn: "AS1".into(),
                region: "us-west".into(),
                reputation: 0.9,
            },
            pubkey: vec![],
            registered_at_ns: 1,
            active: true,
            signature: String::new(),
        };
        sign_manifest(&kp, manifest).unwrap()
    }

    #[test]
    fn test_register_requires_valid_signature() {
        let pool = VerifierPool::new();
        let mut manifest = signed_manifest("did:swarm:v1", 1000);

        pool.register(manifest.clone()).unwrap();
        assert_eq!(pool.len(), 1);

        manifest.stake = 9999; // Invalidates the signature.
        assert!(matches!(
            pool.register(manifest),
            Err(CommitteeError::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_active_filtering_by_stake() {
        let pool = VerifierPool::new();
        pool.register(signed_manifest("did:swarm:small", 50)).unwrap();
        pool.register(signed_manifest("did:swarm:big", 5000)).unwrap();

        let active = pool.active_verifiers(100);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].verifier_id, "did:swarm:big");
        assert_eq!(pool.active_count(1), 2);
    }

    #[test]
    fn test_eligibility_checks() {
        let pool = VerifierPool::new();
        pool.register(signed_manifest("did:swarm:v1", 1000)).unwrap();

        assert!(pool.check_eligible("did:swarm:v1", 100).is_ok());
        assert!(matches!(
            pool.check_eligible("did:swarm:v1", 10_000),
            Err(CommitteeError::InsufficientStake { .. })
        ));
        assert!(matches!(
            pool.check_eligible("did:swarm:ghost", 100),
            Err(CommitteeError::UnknownVerifier(_))
        ));

        pool.deactivate("did:swarm:v1").unwrap();
        assert!(matches!(
            pool.check_eligible("did:swarm:v1", 100),
            Err(CommitteeError::InactiveVerifier(_))
        ));
        pool.activate("did:swarm:v1").unwrap();
        assert!(pool.check_eligible("did:swarm:v1", 100).is_ok());
    }
}
