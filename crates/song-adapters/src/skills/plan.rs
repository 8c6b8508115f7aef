use async_trait::async_trait;
use serde_json::json;

use song_core::constants::keys;
use song_core::model::{NodeName, Payload, WorkflowContext};
use song_core::skill::{FieldType, GenerationParams, PayloadSchema, StageSkill, StageSummary};
use song_core::StageError;
use song_domain::sections::default_line_target;
use song_domain::{PlanArtifact, SectionTarget};

use crate::inputs;

pub const DEFAULT_SECTION_ORDER: [&str; 6] = ["Verse", "Chorus", "Verse", "Chorus", "Bridge", "Chorus"];

/// Section order, line targets and evaluation targets for the song.
#[derive(Debug, Clone, Default)]
pub struct PlanSkill;

#[async_trait]
impl StageSkill for PlanSkill {
    fn name(&self) -> &str {
        "plan"
    }

    fn node(&self) -> NodeName {
        NodeName::Plan
    }

    fn input_schema(&self) -> Option<PayloadSchema> {
        Some(PayloadSchema::new().field(keys::MANIFEST, FieldType::Object))
    }

    async fn run(&self, input: &Payload, _ctx: &WorkflowContext, _params: &GenerationParams) -> Result<Payload, StageError> {
        let manifest = inputs::manifest(input)?;
        let blueprint = inputs::blueprint(input)?;

        let requested: Vec<String> = manifest.lyrics.section_order.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        let section_order = if !requested.is_empty() {
            requested
        } else if !blueprint.required_sections().is_empty() {
            blueprint.required_sections().to_vec()
        } else {
            DEFAULT_SECTION_ORDER.iter().map(|s| s.to_string()).collect()
        };

        let mut targets: Vec<SectionTarget> = Vec::new();
        for name in &section_order {
            if !targets.iter().any(|t| &t.name == name) {
                targets.push(SectionTarget { name:  name.clone(),
                                             lines: default_line_target(name) });
            }
        }

        let threshold = blueprint.eval_rubric.thresholds.min_total.unwrap_or_else(|| inputs::pass_threshold(input));
        let plan = PlanArtifact { section_order,
                                  targets,
                                  evaluation_targets: json!({
                                      "min_total": threshold,
                                      "weights": blueprint.eval_rubric.weights,
                                      "required_sections": blueprint.required_sections(),
                                  }),
                                  work_items: ["style", "lyrics", "producer_notes", "compose"].iter().map(|s| s.to_string()).collect() };
        inputs::encode(&plan)
    }

    fn summarize(&self, output: &Payload) -> StageSummary {
        let sections = output.get("section_order").and_then(|v| v.as_array()).map_or(0, Vec::len);
        StageSummary { metrics: [("sections".to_string(), sections as f64)].into_iter().collect(),
                       issues:  Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use song_core::model::{ArtifactSpec, ScopeContext};
    use uuid::Uuid;

    fn run(manifest: Value, blueprint: Value) -> PlanArtifact {
        let mut input = Payload::new();
        input.insert(keys::MANIFEST.into(), manifest);
        input.insert(keys::BLUEPRINT.into(), blueprint);
        let ctx = WorkflowContext::for_node(Uuid::nil(), Uuid::nil(), 1, NodeName::Plan, ScopeContext::default());
        let out = tokio_test::block_on(PlanSkill.run(&input, &ctx, &GenerationParams::default())).unwrap();
        PlanArtifact::from_value(&Value::Object(out)).unwrap()
    }

    #[test]
    fn manifest_order_wins() {
        let plan = run(json!({"title": "T", "lyrics": {"section_order": ["Verse", "Chorus", "Verse"]}}),
                       json!({"rules": {"required_sections": ["Verse", "Chorus", "Bridge"]}}));
        assert_eq!(plan.section_order, vec!["Verse", "Chorus", "Verse"]);
        assert_eq!(plan.targets.len(), 2);
        assert_eq!(plan.target_lines("Chorus"), Some(4));
    }

    #[test]
    fn falls_back_to_blueprint_then_default() {
        let plan = run(json!({"title": "T"}), json!({"rules": {"required_sections": ["Verse", "Bridge"]}}));
        assert_eq!(plan.section_order, vec!["Verse", "Bridge"]);
        assert_eq!(plan.target_lines("Bridge"), Some(2));

        let plan = run(json!({"title": "T"}), Value::Null);
        assert_eq!(plan.section_order, DEFAULT_SECTION_ORDER.to_vec());
        assert_eq!(plan.evaluation_targets["min_total"], 0.85);
    }
}
