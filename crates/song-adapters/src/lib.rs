//! song-adapters: the concrete stage skills.
//!
//! Each skill decodes what it needs from the working payload into typed
//! domain values, does its work, and encodes a typed artifact back. The
//! orchestrator in song-core only sees `StageSkill` and payload maps.
//!
//! - `skills`: PLAN, STYLE, LYRICS, PRODUCER, COMPOSE, VALIDATE, FIX, REVIEW.
//! - `registry::default_skills`: all eight wired to one generator.

mod inputs;
pub mod registry;
pub mod skills;

pub use registry::default_skills;
pub use skills::{ComposeSkill, FixSkill, LyricsSkill, PlanSkill, ProducerSkill, ReviewSkill, StyleSkill, ValidateSkill};
