//! Song request as submitted by the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DomainError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleRequest {
    #[serde(default)]
    pub tempo_bpm: Option<u32>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub instrumentation: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricsRequest {
    #[serde(default)]
    pub section_order: Vec<String>,
    /// Letter scheme such as "ABAB" or "AABB".
    #[serde(default)]
    pub rhyme_scheme: Option<String>,
    #[serde(default)]
    pub hook: Option<String>,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub themes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerRequest {
    #[serde(default)]
    pub arrangement: Option<String>,
    #[serde(default)]
    pub lufs_target: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationRequest {
    #[serde(default)]
    pub sources: Vec<String>,
    /// Chunk hashes resolved first, in order, on every run.
    #[serde(default)]
    pub pinned_hashes: Vec<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongManifest {
    pub title: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub style: StyleRequest,
    #[serde(default)]
    pub lyrics: LyricsRequest,
    #[serde(default)]
    pub producer: ProducerRequest,
    #[serde(default)]
    pub citations: CitationRequest,
}

impl SongManifest {
    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        let manifest: SongManifest =
            serde_json::from_value(value.clone()).map_err(|e| DomainError::Malformed { what: "manifest",
                                                                                       message: e.to_string() })?;
        if manifest.title.trim().is_empty() {
            return Err(DomainError::ValidationError("manifest title is empty".into()));
        }
        Ok(manifest)
    }

    /// Hook phrase: the requested one, else the title.
    pub fn hook(&self) -> String {
        self.lyrics
            .hook
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| self.title.trim())
            .to_string()
    }
}
