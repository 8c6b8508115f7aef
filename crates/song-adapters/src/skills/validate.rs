use async_trait::async_trait;
use serde_json::Value;

use song_core::constants::keys;
use song_core::model::{NodeName, Payload, WorkflowContext};
use song_core::skill::{FieldType, GenerationParams, PayloadSchema, StageSkill, StageSummary};
use song_core::StageError;
use song_domain::LyricsArtifact;
use song_policies::{Rubric, ScoringContext};

use crate::inputs;

/// Scores the current lyrics against the blueprint rubric.
#[derive(Debug, Clone, Default)]
pub struct ValidateSkill;

#[async_trait]
impl StageSkill for ValidateSkill {
    fn name(&self) -> &str {
        "validate"
    }

    fn node(&self) -> NodeName {
        NodeName::Validate
    }

    fn input_schema(&self) -> Option<PayloadSchema> {
        Some(PayloadSchema::new().field(keys::LYRICS, FieldType::Object)
                                 .field(keys::STYLE, FieldType::Object)
                                 .field(keys::PRODUCER_NOTES, FieldType::Object))
    }

    fn output_schema(&self) -> Option<PayloadSchema> {
        Some(PayloadSchema::new().field(keys::SCORES, FieldType::Object)
                                 .field(keys::TOTAL, FieldType::Number)
                                 .field(keys::PASS, FieldType::Bool)
                                 .field(keys::ISSUES, FieldType::Array))
    }

    async fn run(&self, input: &Payload, _ctx: &WorkflowContext, _params: &GenerationParams) -> Result<Payload, StageError> {
        let manifest = inputs::manifest(input)?;
        let blueprint = inputs::blueprint(input)?;
        let lyrics: LyricsArtifact = inputs::artifact(input, keys::LYRICS)?;

        let rubric = Rubric::from_blueprint(&blueprint, inputs::pass_threshold(input)).map_err(|e| StageError::InvalidInput(e.to_string()))?;
        let scoring = ScoringContext::from_blueprint(&blueprint, manifest.lyrics.explicit, Some(lyrics.rhyme_scheme.as_str()));
        let report = rubric.score(&lyrics.text, &scoring);
        inputs::encode(&report)
    }

    fn summarize(&self, output: &Payload) -> StageSummary {
        let mut metrics: std::collections::BTreeMap<String, f64> = output.get(keys::SCORES)
                                                                         .and_then(Value::as_object)
                                                                         .map(|m| m.iter().filter_map(|(k, v)| v.as_f64().map(|v| (k.clone(), v))).collect())
                                                                         .unwrap_or_default();
        if let Some(total) = output.get(keys::TOTAL).and_then(Value::as_f64) {
            metrics.insert(keys::TOTAL.to_string(), total);
        }
        let issues = output.get(keys::ISSUES)
                           .and_then(Value::as_array)
                           .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                           .unwrap_or_default();
        StageSummary { metrics, issues }
    }
}
