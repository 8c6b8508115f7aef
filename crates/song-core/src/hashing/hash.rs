//! SHA-256 helpers. Every hash in the engine is 64 lowercase hex chars.

use log::warn;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::canonical_json::{strip_volatile, to_canonical_json};
use crate::constants::VOLATILE_KEYS;

/// Hashes a string and returns lowercase hex.
pub fn hash_str(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hashes the canonical form of a JSON value.
pub fn hash_value(value: &Value) -> String {
    hash_str(&to_canonical_json(value))
}

/// Hashes any serializable value through its canonical JSON form.
///
/// Serialization failures degrade provenance, not correctness: the error is
/// logged and an empty string is returned.
pub fn hash_serializable<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(v) => hash_value(&v),
        Err(e) => {
            warn!("hash skipped, value is not serializable: {e}");
            String::new()
        }
    }
}

/// Hash of `value` with volatile keys (timestamps, execution metadata,
/// previous hashes) stripped at every depth.
pub fn content_hash(value: &Value) -> String {
    hash_value(&strip_volatile(value, VOLATILE_KEYS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn sha256_of_empty_string() {
        assert_eq!(hash_str(""), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }

    #[test]
    fn non_string_map_keys_are_coerced() {
        let mut m: HashMap<u32, &str> = HashMap::new();
        m.insert(2, "b");
        m.insert(1, "a");
        assert_eq!(hash_serializable(&m), hash_value(&json!({"1": "a", "2": "b"})));
    }

    #[test]
    fn unserializable_value_hashes_to_empty() {
        struct Broken;
        impl Serialize for Broken {
            fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("broken"))
            }
        }
        assert_eq!(hash_serializable(&Broken), "");
    }

    #[test]
    fn content_hash_ignores_volatile_keys() {
        let a = json!({"text": "x", "compiled_at": "2024-01-01T00:00:00Z", "_execution": {"duration_ms": 3}});
        let b = json!({"text": "x", "compiled_at": "2025-06-01T00:00:00Z", "_execution": {"duration_ms": 9}});
        assert_eq!(content_hash(&a), content_hash(&b));
        assert_ne!(content_hash(&a), content_hash(&json!({"text": "y"})));
    }
}
