// Path: crates/crypto/src/sign/mod.rs
//! Ed25519 signing for envelopes, manifests, and checkpoints.

use ed25519_dalek::{Signer, Verifier};
use rand::rngs::OsRng;
use swarm_types::error::CryptoError;

/// Ed25519 key pair.
#[derive(Clone)]
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

/// Ed25519 public verification key.
#[derive(Clone, PartialEq, Eq)]
pub struct Ed25519PublicKey(ed25519_dalek::VerifyingKey);

/// Ed25519 private signing key (seed form).
#[derive(Clone)]
pub struct Ed25519PrivateKey(ed25519_dalek::SigningKey);

/// Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(ed25519_dalek::Signature);

impl Ed25519KeyPair {
    /// Generate a fresh key pair from the OS entropy source.
    pub fn generate() -> Self {
        let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Reconstruct a key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self, CryptoError> {
        let seed: [u8; 32] = seed.try_into().map_err(|_| {
            CryptoError::InvalidKey("invalid private key length: expected 32 bytes".to_string())
        })?;
        Ok(Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
        })
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key())
    }

    pub fn private_key(&self) -> Ed25519PrivateKey {
        Ed25519PrivateKey(self.signing_key.clone())
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message))
    }
}

impl Ed25519PublicKey {
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| CryptoError::VerificationFailed)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey("invalid public key length: expected 32 bytes".to_string())
        })?;
        ed25519_dalek::VerifyingKey::from_bytes(&raw)
            .map(Ed25519PublicKey)
            .map_err(|e| CryptoError::InvalidKey(format!("failed to parse public key: {}", e)))
    }
}

impl Ed25519PrivateKey {
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.0.sign(message))
    }

    /// Export just the seed (32 bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ed25519KeyPair::from_seed(bytes).map(|kp| Ed25519PrivateKey(kp.signing_key))
    }
}

impl Ed25519Signature {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        ed25519_dalek::Signature::from_slice(bytes)
            .map(Ed25519Signature)
            .map_err(|e| CryptoError::InvalidSignature(format!("failed to parse signature: {}", e)))
    }
}

/// Verify a detached signature given raw key and signature bytes. The
/// envelope layer carries both as hex on the wire.
pub fn verify_detached(
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let pk = Ed25519PublicKey::from_bytes(public_key)?;
    let sig = Ed25519Signature::from_bytes(signature)?;
    pk.verify(message, &sig)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let kp = Ed25519KeyPair::generate();
        let msg = b"attest: proposal p1";
        let sig = kp.sign(msg);
        assert!(kp.public_key().verify(msg, &sig).is_ok());
        assert!(kp.public_key().verify(b"other message", &sig).is_err());
    }

    #[test]
    fn test_seed_roundtrip() {
        let kp = Ed25519KeyPair::generate();
        let seed = kp.private_key().to_bytes();
        let restored = Ed25519KeyPair::from_seed(&seed).unwrap();
        assert_eq!(kp.public_key().to_bytes(), restored.public_key().to_bytes());
    }

    #[test]
    fn test_detached_verify_rejects_tampering() {
        let kp = Ed25519KeyPair::generate();
        let msg = b"payload";
        let mut sig = kp.sign(msg).to_bytes();
        assert!(verify_detached(&kp.public_key().to_bytes(), msg, &sig).is_ok());
        sig[0] ^= 0x01;
        assert!(verify_detached(&kp.public_key().to_bytes(), msg, &sig).is_err());
    }

    #[test]
    fn test_bad_key_material_rejected() {
        assert!(Ed25519PublicKey::from_bytes(&[0u8; 31]).is_err());
        assert!(Ed25519KeyPair::from_seed(&[0u8; 16]).is_err());
    }
}
