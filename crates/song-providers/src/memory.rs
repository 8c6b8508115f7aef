use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use crate::{Capability, Citation, CitationBackend, ResolutionError};

/// Fixed in-memory chunk set. Search ignores query and seed and returns
/// chunks in hash order, so it is fully deterministic.
#[derive(Debug, Clone)]
pub struct InMemoryCitationSource {
    name:         String,
    chunks:       BTreeMap<String, Citation>,
    capabilities: BTreeSet<Capability>,
}

impl InMemoryCitationSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name:         name.into(),
               chunks:       BTreeMap::new(),
               capabilities: [Capability::Lookup, Capability::Search].into_iter().collect() }
    }

    pub fn with_chunk(mut self, text: impl Into<String>) -> Self {
        self.add(text);
        self
    }

    pub fn with_chunks<I, S>(mut self, texts: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<String>
    {
        for text in texts {
            self.add(text);
        }
        self
    }

    /// Restricts the source to the given capabilities.
    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.iter().copied().collect();
        self
    }

    /// Adds a chunk and returns its hash.
    pub fn add(&mut self, text: impl Into<String>) -> String {
        let citation = Citation::new(self.name.clone(), text);
        let hash = citation.chunk_hash.clone();
        self.chunks.insert(hash.clone(), citation);
        hash
    }

    pub fn hashes(&self) -> Vec<String> {
        self.chunks.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
impl CitationBackend for InMemoryCitationSource {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    async fn lookup(&self, chunk_hash: &str) -> Result<Option<Citation>, ResolutionError> {
        if !self.supports(Capability::Lookup) {
            return Err(ResolutionError::CapabilityNotSupported { source_id:  self.name.clone(),
                                                                 capability: Capability::Lookup });
        }
        Ok(self.chunks.get(chunk_hash).cloned())
    }

    async fn search(&self, _query: &str, top_k: usize, _seed: u64, exclude: &BTreeSet<String>) -> Result<Vec<Citation>, ResolutionError> {
        if !self.supports(Capability::Search) {
            return Err(ResolutionError::CapabilityNotSupported { source_id:  self.name.clone(),
                                                                 capability: Capability::Search });
        }
        Ok(self.chunks.values().filter(|c| !exclude.contains(&c.chunk_hash)).take(top_k).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_is_hash_ordered_and_query_blind() {
        let source = InMemoryCitationSource::new("lore").with_chunks(["one", "two", "three"]);
        let mut sorted = source.hashes();
        sorted.sort();
        let a = tokio_test::block_on(source.search("storm", 3, 1, &BTreeSet::new())).unwrap();
        let b = tokio_test::block_on(source.search("calm", 3, 99, &BTreeSet::new())).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.iter().map(|c| c.chunk_hash.clone()).collect::<Vec<_>>(), sorted);
    }

    #[test]
    fn missing_capability_is_typed() {
        let source = InMemoryCitationSource::new("lore").with_chunk("x").with_capabilities(&[Capability::Lookup]);
        let err = tokio_test::block_on(source.search("q", 1, 0, &BTreeSet::new())).unwrap_err();
        assert_eq!(err,
                   ResolutionError::CapabilityNotSupported { source_id:  "lore".into(),
                                                             capability: Capability::Search });
    }
}
