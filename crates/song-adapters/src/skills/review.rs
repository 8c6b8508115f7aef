use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

use song_core::constants::keys;
use song_core::hashing::content_hash;
use song_core::model::{NodeName, Payload, WorkflowContext};
use song_core::skill::{FieldType, GenerationParams, PayloadSchema, StageSkill, StageSummary};
use song_core::StageError;
use song_domain::{LyricsArtifact, ReviewSummaryArtifact};

use crate::inputs;

const REVIEWED: [&str; 4] = [keys::STYLE, keys::LYRICS, keys::PRODUCER_NOTES, keys::COMPOSED_PROMPT];

/// Closing summary: final verdict and content hashes of the final
/// artifacts.
#[derive(Debug, Clone, Default)]
pub struct ReviewSkill;

#[async_trait]
impl StageSkill for ReviewSkill {
    fn name(&self) -> &str {
        "review"
    }

    fn node(&self) -> NodeName {
        NodeName::Review
    }

    fn input_schema(&self) -> Option<PayloadSchema> {
        Some(PayloadSchema::new().field(keys::VALIDATION, FieldType::Object)
                                 .field(keys::LYRICS, FieldType::Object))
    }

    async fn run(&self, input: &Payload, _ctx: &WorkflowContext, _params: &GenerationParams) -> Result<Payload, StageError> {
        let validation = input.get(keys::VALIDATION).ok_or_else(|| StageError::InvalidInput(format!("missing `{}`", keys::VALIDATION)))?;
        let lyrics: LyricsArtifact = inputs::artifact(input, keys::LYRICS)?;

        let artifact_hashes: BTreeMap<String, String> =
            REVIEWED.iter().filter_map(|key| input.get(*key).map(|v| (key.to_string(), content_hash(v)))).collect();
        let summary = ReviewSummaryArtifact { total: validation.get(keys::TOTAL).and_then(Value::as_f64).unwrap_or(0.0),
                                              pass: validation.get(keys::PASS).and_then(Value::as_bool).unwrap_or(false),
                                              fix_iterations: inputs::fix_iterations(input),
                                              artifact_hashes,
                                              citations: lyrics.citations };
        inputs::encode(&summary)
    }

    fn summarize(&self, output: &Payload) -> StageSummary {
        let total = output.get(keys::TOTAL).and_then(Value::as_f64).unwrap_or(0.0);
        let pass = output.get(keys::PASS).and_then(Value::as_bool).unwrap_or(false);
        StageSummary { metrics: [(keys::TOTAL.to_string(), total)].into_iter().collect(),
                       issues:  if pass { Vec::new() } else { vec!["final lyrics below threshold".to_string()] } }
    }
}
