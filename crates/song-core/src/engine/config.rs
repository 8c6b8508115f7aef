//! Engine configuration from environment variables.
//!
//! Convention: `SONGFLOW_*` variables, `.env` loaded once per process.

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_PASS_THRESHOLD, MAX_FIX_ITERATIONS};
use crate::skill::GenerationParams;

// Loads .env lazily, once.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // a missing .env is fine
});

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Fix iterations allowed per run, never above `MAX_FIX_ITERATIONS`.
    pub max_fix_iterations: u32,
    /// Pass threshold forwarded to VALIDATE when the blueprint has none.
    pub pass_threshold: f64,
    /// Upper bound of a single stage call.
    pub stage_timeout: Duration,
    pub generation: GenerationParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_fix_iterations: MAX_FIX_ITERATIONS,
               pass_threshold: DEFAULT_PASS_THRESHOLD,
               stage_timeout: Duration::from_millis(120_000),
               generation: GenerationParams::default() }
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let defaults = Self::default();
        let max_fix_iterations = parsed::<u32>("SONGFLOW_MAX_FIX_ITERATIONS").unwrap_or(defaults.max_fix_iterations)
                                                                            .min(MAX_FIX_ITERATIONS);
        let pass_threshold = parsed::<f64>("SONGFLOW_PASS_THRESHOLD").filter(|t| (0.0..=1.0).contains(t))
                                                                     .unwrap_or(defaults.pass_threshold);
        let stage_timeout = parsed::<u64>("SONGFLOW_STAGE_TIMEOUT_MS").map(Duration::from_millis)
                                                                      .unwrap_or(defaults.stage_timeout);
        let temperature = parsed::<f64>("SONGFLOW_TEMPERATURE").unwrap_or(defaults.generation.temperature);
        let max_tokens = parsed::<u32>("SONGFLOW_MAX_TOKENS").unwrap_or(defaults.generation.max_tokens);
        let model = env::var("SONGFLOW_MODEL").unwrap_or(defaults.generation.model);
        Self { max_fix_iterations,
               pass_threshold,
               stage_timeout,
               generation: GenerationParams { temperature, max_tokens, model } }
    }

    /// Same config with a different iteration budget, capped at the hard bound.
    pub fn with_max_fix_iterations(mut self, n: u32) -> Self {
        self.max_fix_iterations = n.min(MAX_FIX_ITERATIONS);
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }
}

/// Forces `.env` loading early, for binaries that read other variables.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
