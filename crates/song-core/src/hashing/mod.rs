//! Canonical JSON and content hashing.

pub mod canonical_json;
pub mod hash;

pub use canonical_json::{strip_volatile, to_canonical_json};
pub use hash::{content_hash, hash_serializable, hash_str, hash_value};
