//! Stage skills and the execution envelope that wraps them.

mod definition;
mod envelope;
mod registry;
mod schema;

pub use definition::{GenerationParams, StageSkill, StageSummary};
pub use envelope::{SkillEnvelope, StageResult};
pub use registry::SkillRegistry;
pub use schema::{FieldType, PayloadSchema};
