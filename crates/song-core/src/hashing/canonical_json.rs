//! Canonical JSON: object keys sorted, no insignificant whitespace.

use serde_json::Value;
use std::collections::BTreeMap;

/// Serializes `value` with lexicographically ordered object keys at every
/// depth, so two structurally equal values always produce the same string.
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(_) => value.to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let mut tree = BTreeMap::new();
            for (k, v) in map {
                tree.insert(k, to_canonical_json(v));
            }
            let items: Vec<String> = tree.into_iter()
                                         .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
                                         .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

/// Returns a copy of `value` without the given keys, removed at any depth.
pub fn strip_volatile(value: &Value, keys: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.iter()
                                               .filter(|(k, _)| !keys.contains(&k.as_str()))
                                               .map(|(k, v)| (k.clone(), strip_volatile(v, keys)))
                                               .collect()),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| strip_volatile(v, keys)).collect()),
        other => other.clone(),
    }
}
