//! song-core: deterministic orchestration engine for the song pipeline.
//!
//! Owns the determinism primitives (seed derivation, canonical hashing), the
//! run model and its state machine, the skill execution envelope, the event
//! framework and the `Orchestrator` that drives the fixed stage sequence with
//! its bounded VALIDATE/FIX loop.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod generation;
pub mod hashing;
pub mod model;
pub mod repo;
pub mod skill;

pub use engine::{CancelOutcome, EngineConfig, Orchestrator, OrchestratorBuilder, RunRequest, Verdict};
pub use errors::{EngineError, ErrorKind, RepositoryError, SkillError, StageError};
pub use event::{Event, EventPhase, EventSink, InMemoryEventStore, InMemoryMetricsSink, MetricStatus, MetricsSink};
pub use generation::{GenerationError, GenerationRequest, SeededMockGenerator, TextGenerator};
pub use model::{derive_seed, ArtifactKind, ArtifactSpec, NodeName, NodeOutput, Payload, RunFailure, RunPatch, RunStatus, ScopeContext,
                WorkflowContext, WorkflowRun};
pub use repo::{InMemoryRunRepository, RunRepository};
pub use skill::{FieldType, GenerationParams, PayloadSchema, SkillEnvelope, SkillRegistry, StageResult, StageSkill, StageSummary};
