//! Typed artifacts on top of plain payloads.
//!
//! A stage output is a JSON mapping; domain crates describe its shape with a
//! concrete type implementing `ArtifactSpec` (usually through the
//! `typed_artifact!` macro). Encoding adds `kind` and `schema_version` so a
//! payload can be checked when it is decoded again downstream.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::Payload;

/// Kinds of artifact exchanged between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Plan,
    Style,
    Lyrics,
    ProducerNotes,
    ComposedPrompt,
    ScoreReport,
    FixReport,
    ReviewSummary,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Plan => "plan",
            ArtifactKind::Style => "style",
            ArtifactKind::Lyrics => "lyrics",
            ArtifactKind::ProducerNotes => "producer_notes",
            ArtifactKind::ComposedPrompt => "composed_prompt",
            ArtifactKind::ScoreReport => "score_report",
            ArtifactKind::FixReport => "fix_report",
            ArtifactKind::ReviewSummary => "review_summary",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArtifactDecodeError {
    #[error("expected artifact kind {expected}, found {found}")]
    KindMismatch { expected: ArtifactKind, found: String },
    #[error("expected schema version {expected}, found {found:?}")]
    VersionMismatch { expected: u32, found: Option<u64> },
    #[error("payload is not an object")]
    NotAnObject,
    #[error("serialize: {0}")]
    Serialize(String),
    #[error("deserialize: {0}")]
    Deserialize(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Typed view of an artifact payload.
pub trait ArtifactSpec: Sized + Serialize + DeserializeOwned + Clone {
    const KIND: ArtifactKind;
    /// Bump on incompatible changes.
    const SCHEMA_VERSION: u32 = 1;

    /// Light semantic validation, no side effects.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Encodes into a payload tagged with kind and schema version.
    fn to_payload(&self) -> Result<Payload, ArtifactDecodeError> {
        self.validate().map_err(ArtifactDecodeError::Validation)?;
        match serde_json::to_value(self).map_err(|e| ArtifactDecodeError::Serialize(e.to_string()))? {
            Value::Object(mut map) => {
                map.insert("kind".into(), Value::from(Self::KIND.as_str()));
                map.insert("schema_version".into(), Value::from(Self::SCHEMA_VERSION));
                Ok(map)
            }
            _ => Err(ArtifactDecodeError::NotAnObject),
        }
    }

    /// Decodes a payload, checking kind (when present), schema version and
    /// `validate`. Unknown keys such as `_hash` are ignored.
    fn from_value(value: &Value) -> Result<Self, ArtifactDecodeError> {
        let map = value.as_object().ok_or(ArtifactDecodeError::NotAnObject)?;
        if let Some(kind) = map.get("kind").and_then(Value::as_str) {
            if kind != Self::KIND.as_str() {
                return Err(ArtifactDecodeError::KindMismatch { expected: Self::KIND,
                                                               found: kind.to_string() });
            }
        }
        let found = map.get("schema_version").and_then(Value::as_u64);
        if found != Some(u64::from(Self::SCHEMA_VERSION)) {
            return Err(ArtifactDecodeError::VersionMismatch { expected: Self::SCHEMA_VERSION,
                                                              found });
        }
        let decoded: Self =
            serde_json::from_value(value.clone()).map_err(|e| ArtifactDecodeError::Deserialize(e.to_string()))?;
        decoded.validate().map_err(ArtifactDecodeError::Validation)?;
        Ok(decoded)
    }
}

/// Declares a plain data struct and implements `ArtifactSpec` for it.
///
/// ```ignore
/// typed_artifact!(
///     /// Tempo and key chosen by STYLE.
///     StyleArtifact kind: ArtifactKind::Style, {
///         tempo_bpm: u32,
///         key: String,
///     }
/// );
/// ```
#[macro_export]
macro_rules! typed_artifact {
    ($(#[$meta:meta])* $name:ident kind: $kind:expr, { $($(#[$fmeta:meta])* $fname:ident : $fty:ty),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        pub struct $name { $($(#[$fmeta])* pub $fname: $fty,)+ }
        impl $crate::model::ArtifactSpec for $name {
            const KIND: $crate::model::ArtifactKind = $kind;
        }
    };
}
