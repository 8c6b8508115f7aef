//! Skill execution envelope.
//!
//! Wraps a stage call with, in order: input shape validation, the call itself
//! (optionally bounded by a timeout), output shape validation, input/output
//! content hashing and execution metadata. One `Start` event is emitted before
//! the call and exactly one terminal event after it. Event and metrics sinks
//! are optional; leaving them out never changes the result.
use log::{debug, error, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{GenerationParams, StageSkill, StageSummary};
use crate::constants::{ENGINE_VERSION, EXECUTION_METADATA_KEY, HASH_KEY};
use crate::errors::{ErrorKind, SkillError};
use crate::event::{Event, EventSink, MetricStatus, MetricsSink};
use crate::hashing::content_hash;
use crate::model::{Payload, WorkflowContext};

/// Successful stage call as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    /// Skill output with `_hash` and `_execution` attached.
    pub output: Payload,
    pub summary: StageSummary,
    pub duration_ms: u64,
    pub input_hash: String,
    pub output_hash: String,
}

#[derive(Clone, Default)]
pub struct SkillEnvelope {
    events: Option<Arc<dyn EventSink>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    timeout: Option<Duration>,
}

impl SkillEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn with_metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn publish(&self, event: Event) {
        if let Some(sink) = &self.events {
            sink.publish(event);
        }
    }

    fn record(&self, skill: &str, duration_ms: u64, status: MetricStatus) {
        if let Some(sink) = &self.metrics {
            sink.record(skill, duration_ms, status);
        }
    }

    /// Runs `skill` on `input` inside the envelope.
    pub async fn execute(&self,
                         skill: &dyn StageSkill,
                         input: &Payload,
                         ctx: &WorkflowContext,
                         params: &GenerationParams)
                         -> Result<StageResult, SkillError> {
        let name = skill.name();
        debug!("run {} node {} skill '{}' start (seed={})", ctx.run_id, ctx.node_name, name, ctx.seed);
        self.publish(Event::start(ctx.run_id, ctx.node_name, name));

        let started = Instant::now();
        let result = self.invoke(skill, input, ctx, params).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(mut output) => {
                let input_hash = content_hash(&Value::Object(input.clone()));
                let output_hash = content_hash(&Value::Object(output.clone()));
                output.insert(HASH_KEY.to_string(), Value::from(output_hash.clone()));
                output.insert(EXECUTION_METADATA_KEY.to_string(),
                              json!({
                                  "skill": name,
                                  "node": ctx.node_name,
                                  "node_index": ctx.node_index,
                                  "seed": ctx.seed,
                                  "duration_ms": duration_ms,
                                  "input_hash": input_hash,
                                  "output_hash": output_hash,
                                  "params": params,
                                  "engine_version": ENGINE_VERSION,
                              }));
                let summary = skill.summarize(&output);
                debug!("run {} node {} skill '{}' end in {} ms", ctx.run_id, ctx.node_name, name, duration_ms);
                self.publish(Event::end(ctx.run_id,
                                        ctx.node_name,
                                        name,
                                        duration_ms,
                                        summary.metrics.clone(),
                                        summary.issues.clone()));
                self.record(name, duration_ms, MetricStatus::Ok);
                Ok(StageResult { output,
                                 summary,
                                 duration_ms,
                                 input_hash,
                                 output_hash })
            }
            Err(err) => {
                let status = match err.kind {
                    ErrorKind::Validation => {
                        error!("run {} node {} skill '{}' validation failure: {}", ctx.run_id, ctx.node_name, name, err.message);
                        MetricStatus::ValidationError
                    }
                    ErrorKind::Execution => {
                        warn!("run {} node {} skill '{}' execution failure after {} ms: {}",
                              ctx.run_id, ctx.node_name, name, duration_ms, err.message);
                        MetricStatus::ExecutionError
                    }
                };
                self.publish(Event::fail(ctx.run_id, ctx.node_name, name, duration_ms, err.kind, &err.message));
                self.record(name, duration_ms, status);
                Err(err)
            }
        }
    }

    async fn invoke(&self,
                    skill: &dyn StageSkill,
                    input: &Payload,
                    ctx: &WorkflowContext,
                    params: &GenerationParams)
                    -> Result<Payload, SkillError> {
        let name = skill.name();
        if let Some(schema) = skill.input_schema() {
            schema.check(input).map_err(|m| SkillError::validation(name, format!("input: {m}")))?;
        }

        let call = skill.run(input, ctx, params);
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(res) => res,
                Err(_) => {
                    return Err(SkillError::execution(name, format!("timed out after {} ms", limit.as_millis())));
                }
            },
            None => call.await,
        }.map_err(|e| SkillError::from_stage(name, e))?;

        if let Some(schema) = skill.output_schema() {
            schema.check(&output).map_err(|m| SkillError::validation(name, format!("output: {m}")))?;
        }
        Ok(output)
    }
}
