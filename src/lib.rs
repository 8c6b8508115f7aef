//! SongFlow
//!
//! Song-generation pipeline engine: a fixed PLAN → STYLE → LYRICS ∥ PRODUCER
//! → COMPOSE sequence followed by a bounded VALIDATE/FIX loop.
//!
//! - `song_core`: determinism primitives, envelope, events, orchestrator.
//! - `song_domain`: manifest, blueprint, artifacts, lyric sheet parsing.
//! - `song_policies`: rubric scorer and fix engine.
//! - `song_providers`: hash-pinned citation retrieval.
//! - `song_adapters`: the stage skills.
//!
//! `config::CONFIG` holds the process configuration used by the binary.

pub mod config;

pub use song_adapters as adapters;
pub use song_core as engine;
pub use song_domain as domain;
pub use song_policies as policies;
pub use song_providers as providers;

pub use config::{AppConfig, CONFIG};
