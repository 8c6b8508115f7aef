use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use song_core::constants::keys;
use song_core::generation::TextGenerator;
use song_core::model::{NodeName, Payload, WorkflowContext};
use song_core::skill::{FieldType, GenerationParams, PayloadSchema, StageSkill, StageSummary};
use song_core::StageError;
use song_domain::{LyricsArtifact, ProducerNotesArtifact, StyleArtifact};
use song_policies::{FixEngine, FixInput, FixReport};

use crate::inputs;

/// Seed distance between fix iterations, so each pass asks for new text.
const ITERATION_SEED_STRIDE: u64 = 16;

/// Targeted repair of the current artifacts from the last VALIDATE issues.
/// The output carries the (possibly unchanged) `lyrics`, `style` and
/// `producer_notes` next to the fix report.
#[derive(Debug, Clone)]
pub struct FixSkill {
    engine: FixEngine,
}

impl FixSkill {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { engine: FixEngine::new(generator) }
    }
}

#[async_trait]
impl StageSkill for FixSkill {
    fn name(&self) -> &str {
        "fix"
    }

    fn node(&self) -> NodeName {
        NodeName::Fix
    }

    fn input_schema(&self) -> Option<PayloadSchema> {
        Some(PayloadSchema::new().field(keys::LYRICS, FieldType::Object)
                                 .field(keys::STYLE, FieldType::Object)
                                 .field(keys::PRODUCER_NOTES, FieldType::Object)
                                 .field(keys::VALIDATION, FieldType::Object))
    }

    fn output_schema(&self) -> Option<PayloadSchema> {
        Some(PayloadSchema::new().field(keys::LYRICS, FieldType::Object)
                                 .field(keys::FIXES_APPLIED, FieldType::Array))
    }

    async fn run(&self, input: &Payload, ctx: &WorkflowContext, params: &GenerationParams) -> Result<Payload, StageError> {
        let blueprint = inputs::blueprint(input)?;
        let lyrics: LyricsArtifact = inputs::artifact(input, keys::LYRICS)?;
        let style: StyleArtifact = inputs::artifact(input, keys::STYLE)?;
        let producer_notes: ProducerNotesArtifact = inputs::artifact(input, keys::PRODUCER_NOTES)?;
        let issues: Vec<String> = input.get(keys::VALIDATION)
                                       .and_then(|v| v.get(keys::ISSUES))
                                       .and_then(Value::as_array)
                                       .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                                       .unwrap_or_default();
        let iteration = inputs::fix_iterations(input).max(1);

        let result = self.engine
                         .apply(FixInput { lyrics,
                                           style,
                                           producer_notes,
                                           issues,
                                           blueprint,
                                           seed: ctx.seed.wrapping_add(u64::from(iteration - 1) * ITERATION_SEED_STRIDE),
                                           temperature: params.temperature })
                         .await
                         .map_err(|e| StageError::Execution(e.to_string()))?;

        let mut output = inputs::encode(&FixReport::from(&result))?;
        output.insert(keys::LYRICS.into(), Value::Object(inputs::encode(&result.lyrics)?));
        output.insert(keys::STYLE.into(), Value::Object(inputs::encode(&result.style)?));
        output.insert(keys::PRODUCER_NOTES.into(), Value::Object(inputs::encode(&result.producer_notes)?));
        output.insert(keys::FIX_ITERATIONS.into(), Value::from(iteration));
        Ok(output)
    }

    fn summarize(&self, output: &Payload) -> StageSummary {
        let issues: Vec<String> = output.get(keys::FIXES_APPLIED)
                                        .and_then(Value::as_array)
                                        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                                        .unwrap_or_default();
        let reverted = output.get("outcome").and_then(Value::as_str) == Some("reverted");
        StageSummary { metrics: [("fixes".to_string(), issues.len() as f64), ("reverted".to_string(), if reverted { 1.0 } else { 0.0 })].into_iter()
                                                                                                                                       .collect(),
                       issues }
    }
}
