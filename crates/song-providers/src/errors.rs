use thiserror::Error;

use crate::Capability;

/// Citation resolution failure. Callers degrade to "no citations" instead of
/// failing the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("citation source '{0}' not found")]
    ServerNotFound(String),
    #[error("citation source '{source_id}' does not support {capability}")]
    CapabilityNotSupported { source_id: String, capability: Capability },
    #[error("chunk {0} not found in any source")]
    HashNotFound(String),
}
