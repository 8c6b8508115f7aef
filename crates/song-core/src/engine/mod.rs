//! Orchestrator: fixed stage sequence, run state machine and the bounded
//! VALIDATE/FIX loop.

mod builder;
mod config;
mod core;
mod verdict;

pub use builder::OrchestratorBuilder;
pub use config::{init_dotenv, EngineConfig};
pub use self::core::{CancelOutcome, Orchestrator, RunRequest};
pub use verdict::Verdict;
