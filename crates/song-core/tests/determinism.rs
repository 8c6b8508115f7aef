use serde_json::json;
use song_core::derive_seed;
use song_core::hashing::{hash_serializable, hash_str, hash_value, to_canonical_json};
use std::collections::BTreeMap;

#[test]
fn hash_is_64_lowercase_hex() {
    let h = hash_str("song");
    assert_eq!(h.len(), 64);
    assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn hash_is_stable_under_key_permutation() {
    let a = json!({"style": {"tempo_bpm": 120, "key": "C"}, "tags": ["pop", "upbeat"]});
    let b = json!({"tags": ["pop", "upbeat"], "style": {"key": "C", "tempo_bpm": 120}});
    assert_eq!(hash_value(&a), hash_value(&a));
    assert_eq!(hash_value(&a), hash_value(&b));
    assert_eq!(to_canonical_json(&a), to_canonical_json(&b));
}

#[test]
fn array_order_matters() {
    assert_ne!(hash_value(&json!(["a", "b"])), hash_value(&json!(["b", "a"])));
}

#[test]
fn serializable_and_value_hashes_agree() {
    let mut m = BTreeMap::new();
    m.insert("hook_density", 0.5);
    m.insert("singability", 1.0);
    assert_eq!(hash_serializable(&m), hash_value(&json!({"singability": 1.0, "hook_density": 0.5})));
}

#[test]
fn seed_law_is_exact_addition() {
    for global in [0u64, 1, 42, 1_000_000, i64::MAX as u64 - 8] {
        for idx in 0..8u64 {
            assert_eq!(derive_seed(global, idx), global + idx);
        }
    }
}
