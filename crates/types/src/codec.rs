// Path: crates/types/src/codec.rs

//! Defines the canonical, deterministic JSON codec for all signed state.
//!
//! The wire format of the swarm protocol is canonical JSON: object keys
//! sorted lexicographically, no insignificant whitespace, integers as
//! integers, UTF-8 strings. Every byte sequence that gets hashed or signed
//! (payload hashes, envelope signatures, checkpoint hashes, Merkle leaves)
//! must come through this module, so that all participants agree on the
//! exact bytes for the same logical value.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Encodes a value into its canonical byte representation.
///
/// `serde_json` object maps are backed by a `BTreeMap`, so converting to a
/// `Value` first yields sorted keys; compact serialization then removes all
/// insignificant whitespace.
pub fn to_bytes_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, String> {
    let value = serde_json::to_value(v).map_err(|e| format!("canonical encode failed: {}", e))?;
    serde_json::to_vec(&value).map_err(|e| format!("canonical encode failed: {}", e))
}

/// Decodes a value from its canonical byte representation.
///
/// Fails fast on any decoding error so malformed data never reaches
/// protocol logic.
pub fn from_bytes_canonical<T: serde::de::DeserializeOwned>(b: &[u8]) -> Result<T, String> {
    serde_json::from_slice(b).map_err(|e| format!("canonical decode failed: {}", e))
}

/// SHA-256 over the canonical bytes of a value, hex-encoded.
pub fn hash_canonical<T: Serialize>(v: &T) -> Result<String, String> {
    let bytes = to_bytes_canonical(v)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// SHA-256 over raw bytes, hex-encoded.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Byte size of a payload once canonically serialized. Used by the policy
/// gates for the 1 MiB limit.
pub fn canonical_size(v: &Value) -> usize {
    serde_json::to_vec(v).map(|b| b.len()).unwrap_or(0)
}

/// Serde helpers for byte fields carried as hex strings on the wire.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde helpers for optional byte fields carried as hex strings.
pub mod hex_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => ser.serialize_some(&hex::encode(b)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(de)?;
        match s {
            Some(s) => hex::decode(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
