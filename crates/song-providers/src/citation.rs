use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use song_core::hashing::hash_str;

/// Retrieved text chunk. `chunk_hash` depends on the text only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub chunk_hash: String,
    pub text:       String,
    pub source_id:  String,
    pub weight:     f64,
    #[serde(default)]
    pub metadata:   BTreeMap<String, Value>,
}

impl Citation {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self { chunk_hash: hash_str(&text),
               text,
               source_id: source_id.into(),
               weight: 1.0,
               metadata: BTreeMap::new() }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
