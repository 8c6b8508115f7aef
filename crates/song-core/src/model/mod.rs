//! Run model: node names, per-node context, run record and typed artifacts.

pub mod artifact;
pub mod context;
pub mod node;
pub mod run;

pub use artifact::{ArtifactDecodeError, ArtifactKind, ArtifactSpec};
pub use context::{derive_seed, seeded_rng, ScopeContext, WorkflowContext};
pub use node::NodeName;
pub use run::{NodeOutput, RunFailure, RunInputs, RunPatch, RunStatus, WorkflowRun};

/// Mapping exchanged between stages.
pub type Payload = serde_json::Map<String, serde_json::Value>;
