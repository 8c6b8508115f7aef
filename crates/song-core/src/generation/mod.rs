//! Port to the generative-text capability.
//!
//! The engine consumes text generation as an opaque seeded function. A real
//! backend lives outside this workspace; `SeededMockGenerator` is the
//! deterministic stand-in used by tests and the demo binary.

mod mock;

pub use mock::SeededMockGenerator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system: String,
    pub user_prompt: String,
    pub temperature: f64,
    pub seed: u64,
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, user_prompt: impl Into<String>, temperature: f64, seed: u64) -> Self {
        Self { system: system.into(),
               user_prompt: user_prompt.into(),
               temperature,
               seed }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),
    #[error("generation request rejected: {0}")]
    Rejected(String),
    #[error("generation returned no text")]
    Empty,
}

/// `generate(system, user_prompt, temperature, seed) -> text`.
///
/// Implementations must honor `seed` for any determinism claim to hold.
#[async_trait]
pub trait TextGenerator: Send + Sync + Debug {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}
