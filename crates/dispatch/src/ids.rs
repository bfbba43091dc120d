// Path: crates/dispatch/src/ids.rs

//! Deterministic id derivation.
//!
//! Everything a handler creates (ops, task ids, lease ids) gets its id
//! from the envelope id plus a role tag. Replaying the same envelope
//! re-derives the same ids, so the op-log's duplicate check turns the
//! replay into a no-op, and every replica derives identical ids from the
//! same envelope.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derive a stable UUID from an envelope id and a role tag.
pub fn derive_id(envelope_id: &Uuid, role: &str) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(envelope_id.as_bytes());
    hasher.update(b":");
    hasher.update(role.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// String form used where the protocol wants a free-form id.
pub fn derive_id_str(envelope_id: &Uuid, role: &str) -> String {
    derive_id(envelope_id, role).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_stable_and_role_sensitive() {
        let env = Uuid::new_v4();
        assert_eq!(derive_id(&env, "task"), derive_id(&env, "task"));
        assert_ne!(derive_id(&env, "task"), derive_id(&env, "add_task"));
        assert_ne!(derive_id(&env, "task"), derive_id(&Uuid::new_v4(), "task"));
    }
}
