//! Process-wide configuration.
//!
//! Loads `.env` once and exposes an immutable `CONFIG` built from the
//! `SONGFLOW_*` variables.
use once_cell::sync::Lazy;
use std::env;

use song_core::EngineConfig;

/// Default `SONGFLOW_LOG` filter.
pub const DEFAULT_LOG_FILTER: &str = "info";

pub struct AppConfig {
    pub engine: EngineConfig,
    /// `tracing-subscriber` env-filter directive.
    pub log_filter: String,
}

pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    let engine = EngineConfig::from_env();
    let log_filter = env::var("SONGFLOW_LOG").ok()
                                             .filter(|v| !v.trim().is_empty())
                                             .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    AppConfig { engine, log_filter }
});
