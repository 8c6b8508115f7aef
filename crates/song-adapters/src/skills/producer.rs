use async_trait::async_trait;

use song_core::constants::keys;
use song_core::model::{NodeName, Payload, WorkflowContext};
use song_core::skill::{FieldType, GenerationParams, PayloadSchema, StageSkill, StageSummary};
use song_core::StageError;
use song_domain::sections::is_chorus_like;
use song_domain::{MixTargets, PlanArtifact, ProducerNotesArtifact, SectionNote, StyleArtifact};

use crate::inputs;

/// Arrangement and mix notes. Reads PLAN and STYLE only, so it can run
/// alongside LYRICS.
#[derive(Debug, Clone, Default)]
pub struct ProducerSkill;

/// Energy rises through the song; choruses lift, bridges drop.
fn energy(name: &str, position: usize, count: usize) -> f64 {
    let progress = if count > 1 { position as f64 / (count - 1) as f64 } else { 0.0 };
    let mut energy = 0.4 + 0.3 * progress;
    let lower = name.to_lowercase();
    if is_chorus_like(name) {
        energy += 0.2;
    } else if lower.contains("bridge") {
        energy -= 0.1;
    } else if lower.contains("intro") || lower.contains("outro") {
        energy -= 0.2;
    }
    (energy.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

fn arrangement(name: &str, base: Option<&str>) -> String {
    let lower = name.to_lowercase();
    let hint = if is_chorus_like(name) {
        "full band, doubled lead vocal"
    } else if lower.contains("verse") {
        "sparse, rhythm section and lead vocal"
    } else if lower.contains("bridge") {
        "breakdown, pads and filtered drums"
    } else {
        "ambient texture"
    };
    match base {
        Some(base) if !base.trim().is_empty() => format!("{}; {hint}", base.trim()),
        _ => hint.to_string(),
    }
}

#[async_trait]
impl StageSkill for ProducerSkill {
    fn name(&self) -> &str {
        "producer"
    }

    fn node(&self) -> NodeName {
        NodeName::Producer
    }

    fn input_schema(&self) -> Option<PayloadSchema> {
        Some(PayloadSchema::new().field(keys::PLAN, FieldType::Object)
                                 .field(keys::STYLE, FieldType::Object))
    }

    async fn run(&self, input: &Payload, _ctx: &WorkflowContext, _params: &GenerationParams) -> Result<Payload, StageError> {
        let manifest = inputs::manifest(input)?;
        let plan: PlanArtifact = inputs::artifact(input, keys::PLAN)?;
        let style: StyleArtifact = inputs::artifact(input, keys::STYLE)?;

        let count = plan.section_order.len();
        let sections = plan.section_order
                           .iter()
                           .enumerate()
                           .map(|(i, name)| SectionNote { name:        name.clone(),
                                                          energy:      energy(name, i, count),
                                                          arrangement: arrangement(name, manifest.producer.arrangement.as_deref()) })
                           .collect();
        let mut mix = MixTargets::default();
        if let Some(lufs) = manifest.producer.lufs_target {
            mix.lufs = lufs;
        }
        let mut notes = ProducerNotesArtifact { structure: String::new(),
                                                sections,
                                                mix,
                                                instrumentation: style.instrumentation };
        notes.refresh_structure();
        inputs::encode(&notes)
    }
}
