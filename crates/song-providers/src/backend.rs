use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::{Citation, ResolutionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Direct fetch by chunk hash.
    Lookup,
    /// Ranked search by query.
    Search,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Lookup => f.write_str("lookup"),
            Capability::Search => f.write_str("search"),
        }
    }
}

/// A source of citation chunks.
///
/// Only `lookup` is required to be reproducible. A semantic backend may rank
/// differently between calls; callers pin what they used by hash.
#[async_trait]
pub trait CitationBackend: Send + Sync + fmt::Debug {
    /// Source id, matched against manifest sources.
    fn get_name(&self) -> &str;

    fn get_version(&self) -> &str {
        "1.0.0"
    }

    fn supports(&self, capability: Capability) -> bool;

    async fn lookup(&self, chunk_hash: &str) -> Result<Option<Citation>, ResolutionError>;

    /// Up to `top_k` chunks not in `exclude`.
    async fn search(&self, query: &str, top_k: usize, seed: u64, exclude: &BTreeSet<String>) -> Result<Vec<Citation>, ResolutionError>;
}
