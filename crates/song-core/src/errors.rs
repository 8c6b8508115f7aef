//! Error taxonomy of the engine.
//!
//! Skills return `StageError`; the envelope translates it into a
//! `SkillError` tagged with an `ErrorKind`, which is the only error type the
//! orchestrator sees from a stage call.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::generation::GenerationError;
use crate::model::{NodeName, RunStatus};

/// Failure class of a stage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Shape mismatch at the skill boundary. A programmer error, never retried.
    Validation,
    /// Transient or external failure (generation, network, timeout).
    Execution,
}

impl ErrorKind {
    /// Name recorded as `type` on a failed run.
    pub fn type_name(self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Execution => "ExecutionError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Error returned by a skill implementation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("malformed output: {0}")]
    MalformedOutput(String),
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("execution failed: {0}")]
    Execution(String),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::InvalidInput(_) | StageError::MalformedOutput(_) => ErrorKind::Validation,
            StageError::Generation(_) | StageError::Execution(_) => ErrorKind::Execution,
        }
    }
}

/// Single error type surfaced by `SkillEnvelope::execute`.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("skill '{skill}' failed ({kind}): {message}")]
pub struct SkillError {
    pub skill: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl SkillError {
    pub fn validation(skill: impl Into<String>, message: impl Into<String>) -> Self {
        Self { skill: skill.into(),
               kind: ErrorKind::Validation,
               message: message.into() }
    }

    pub fn execution(skill: impl Into<String>, message: impl Into<String>) -> Self {
        Self { skill: skill.into(),
               kind: ErrorKind::Execution,
               message: message.into() }
    }

    pub fn from_stage(skill: impl Into<String>, err: StageError) -> Self {
        Self { skill: skill.into(),
               kind: err.kind(),
               message: err.to_string() }
    }
}

/// Errors of the run repository.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("run not found: {0}")]
    NotFound(Uuid),
    #[error("run already exists: {0}")]
    AlreadyExists(Uuid),
    #[error("run {run_id} is terminal ({status:?}); record is immutable")]
    Terminal { run_id: Uuid, status: RunStatus },
    #[error("invalid status transition {from:?} -> {to:?}")]
    InvalidTransition { from: RunStatus, to: RunStatus },
    #[error("fix_iterations cannot decrease ({current} -> {requested})")]
    FixIterationsDecrease { current: u32, requested: u32 },
    #[error("fix_iterations {0} exceeds the allowed maximum")]
    FixIterationsExceeded(u32),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors of the orchestrator API.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("run not found: {0}")]
    RunNotFound(Uuid),
    #[error("run {run_id} is already terminal ({status:?})")]
    AlreadyTerminal { run_id: Uuid, status: RunStatus },
    #[error("run {0} is already running")]
    AlreadyRunning(Uuid),
    #[error("run {run_id} cannot be retried while {status:?}")]
    NotRetryable { run_id: Uuid, status: RunStatus },
    #[error("global seed {0} exceeds the supported maximum")]
    InvalidSeed(u64),
    #[error("no skill registered for node {0}")]
    MissingSkill(NodeName),
    #[error("skill '{skill}' registered under {registered} but declares {declared}")]
    MisregisteredSkill { skill: String, registered: NodeName, declared: NodeName },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub(crate) fn from_repository(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => EngineError::RunNotFound(id),
            RepositoryError::Terminal { run_id, status } => EngineError::AlreadyTerminal { run_id, status },
            other => EngineError::Repository(other),
        }
    }
}
