//! song-providers: citation sources for lyric grounding.
//!
//! A citation is identified by the hash of its text. Runs that already
//! cited something pass those hashes back in and get exactly the same
//! chunks first, which is what makes grounded lyrics reproducible.
pub mod backend;
pub mod citation;
pub mod errors;
pub mod memory;
pub mod retriever;

pub use backend::{Capability, CitationBackend};
pub use citation::Citation;
pub use errors::ResolutionError;
pub use memory::InMemoryCitationSource;
pub use retriever::CitationRetriever;
