//! Decoding of the working payload shared between stages.

use serde_json::Value;

use song_core::constants::{keys, DEFAULT_PASS_THRESHOLD};
use song_core::model::{ArtifactSpec, Payload};
use song_core::StageError;
use song_domain::{Blueprint, SongManifest};

pub(crate) fn manifest(input: &Payload) -> Result<SongManifest, StageError> {
    let value = input.get(keys::MANIFEST).ok_or_else(|| StageError::InvalidInput(format!("missing `{}`", keys::MANIFEST)))?;
    SongManifest::from_value(value).map_err(|e| StageError::InvalidInput(e.to_string()))
}

/// Missing blueprint means no rules.
pub(crate) fn blueprint(input: &Payload) -> Result<Blueprint, StageError> {
    Blueprint::from_value(input.get(keys::BLUEPRINT).unwrap_or(&Value::Null)).map_err(|e| StageError::InvalidInput(e.to_string()))
}

pub(crate) fn artifact<T: ArtifactSpec>(input: &Payload, key: &str) -> Result<T, StageError> {
    let value = input.get(key).ok_or_else(|| StageError::InvalidInput(format!("missing `{key}`")))?;
    T::from_value(value).map_err(|e| StageError::InvalidInput(format!("`{key}`: {e}")))
}

pub(crate) fn encode<T: ArtifactSpec>(artifact: &T) -> Result<Payload, StageError> {
    artifact.to_payload().map_err(|e| StageError::MalformedOutput(e.to_string()))
}

pub(crate) fn pass_threshold(input: &Payload) -> f64 {
    input.get(keys::PASS_THRESHOLD).and_then(Value::as_f64).unwrap_or(DEFAULT_PASS_THRESHOLD)
}

pub(crate) fn fix_iterations(input: &Payload) -> u32 {
    input.get(keys::FIX_ITERATIONS).and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok()).unwrap_or(0)
}
