use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::{Capability, Citation, CitationBackend, ResolutionError};

/// Resolves pinned hashes first, then fills the remaining slots by search.
#[derive(Debug, Clone, Default)]
pub struct CitationRetriever {
    backends: BTreeMap<String, Arc<dyn CitationBackend>>,
}

impl CitationRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: Arc<dyn CitationBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn register(&mut self, backend: Arc<dyn CitationBackend>) {
        self.backends.insert(backend.get_name().to_string(), backend);
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    /// Returns the chunks of `previous_hashes` in the given order, followed
    /// by fresh search results (excluding those hashes) up to `top_k`.
    /// Pinned chunks are always all returned, even beyond `top_k`. An empty
    /// `sources` list means every registered source, in id order.
    pub async fn retrieve(&self,
                          sources: &[String],
                          query: &str,
                          previous_hashes: &[String],
                          top_k: usize,
                          seed: u64)
                          -> Result<Vec<Citation>, ResolutionError> {
        let backends = self.resolve_sources(sources)?;

        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut out = Vec::new();
        for hash in previous_hashes {
            if !seen.insert(hash.clone()) {
                continue;
            }
            out.push(Self::lookup(&backends, hash).await?);
        }

        let mut remaining = top_k.saturating_sub(out.len());
        if remaining == 0 || backends.is_empty() {
            return Ok(out);
        }
        let searchable: Vec<&Arc<dyn CitationBackend>> = backends.iter().filter(|b| b.supports(Capability::Search)).collect();
        if searchable.is_empty() {
            return Err(ResolutionError::CapabilityNotSupported { source_id:  backends[0].get_name().to_string(),
                                                                 capability: Capability::Search });
        }
        for backend in searchable {
            if remaining == 0 {
                break;
            }
            for citation in backend.search(query, remaining, seed, &seen).await? {
                if remaining == 0 {
                    break;
                }
                if seen.insert(citation.chunk_hash.clone()) {
                    out.push(citation);
                    remaining -= 1;
                }
            }
        }
        log::debug!("retrieved {} citations ({} pinned)", out.len(), previous_hashes.len());
        Ok(out)
    }

    fn resolve_sources(&self, sources: &[String]) -> Result<Vec<Arc<dyn CitationBackend>>, ResolutionError> {
        if sources.is_empty() {
            return Ok(self.backends.values().cloned().collect());
        }
        sources.iter()
               .map(|id| self.backends.get(id).cloned().ok_or_else(|| ResolutionError::ServerNotFound(id.clone())))
               .collect()
    }

    async fn lookup(backends: &[Arc<dyn CitationBackend>], hash: &str) -> Result<Citation, ResolutionError> {
        let mut lookup_capable = false;
        for backend in backends.iter().filter(|b| b.supports(Capability::Lookup)) {
            lookup_capable = true;
            if let Some(citation) = backend.lookup(hash).await? {
                return Ok(citation);
            }
        }
        match (lookup_capable, backends.first()) {
            (false, Some(first)) => Err(ResolutionError::CapabilityNotSupported { source_id:  first.get_name().to_string(),
                                                                                  capability: Capability::Lookup }),
            _ => Err(ResolutionError::HashNotFound(hash.to_string())),
        }
    }
}
