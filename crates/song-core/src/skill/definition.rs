use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

use super::PayloadSchema;
use crate::errors::StageError;
use crate::model::{NodeName, Payload, WorkflowContext};

/// Generation parameters forwarded to every stage call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f64,
    pub max_tokens: u32,
    pub model: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { temperature: 0.7,
               max_tokens: 1024,
               model: "seeded-mock".to_string() }
    }
}

/// Metrics and issues a skill reports about its own output. Carried on the
/// terminal event and, for scoring stages, on the run's node output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub metrics: BTreeMap<String, f64>,
    pub issues: Vec<String>,
}

/// Common interface of every pipeline stage.
///
/// A skill is a function of `(input, ctx.seed, params)`. Stochastic calls
/// made by the skill must take their seed from `ctx`.
#[async_trait]
pub trait StageSkill: Send + Sync + Debug {
    /// Stable name used in events, logs and metrics.
    fn name(&self) -> &str;

    /// Node this skill implements.
    fn node(&self) -> NodeName;

    fn input_schema(&self) -> Option<PayloadSchema> {
        None
    }

    fn output_schema(&self) -> Option<PayloadSchema> {
        None
    }

    async fn run(&self, input: &Payload, ctx: &WorkflowContext, params: &GenerationParams) -> Result<Payload, StageError>;

    fn summarize(&self, _output: &Payload) -> StageSummary {
        StageSummary::default()
    }
}
