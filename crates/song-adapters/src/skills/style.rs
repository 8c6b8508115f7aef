use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;

use song_core::constants::keys;
use song_core::model::{seeded_rng, NodeName, Payload, WorkflowContext};
use song_core::skill::{FieldType, GenerationParams, PayloadSchema, StageSkill, StageSummary};
use song_core::StageError;
use song_domain::StyleArtifact;

use crate::inputs;

const DEFAULT_TEMPO: u32 = 120;
const KEYS: &[&str] = &["C major", "G major", "D major", "A minor", "E minor", "F major", "B-flat major", "D minor"];
const MOODS: &[&str] = &["hopeful", "melancholic", "defiant", "tender", "euphoric", "restless"];
const INSTRUMENTS: &[&str] = &["piano", "acoustic guitar", "electric guitar", "bass", "drums", "synth pads", "strings", "808"];

/// Tempo, key, mood, instrumentation and tags. Anything the manifest leaves
/// open is picked from fixed lists with the stage seed.
#[derive(Debug, Clone, Default)]
pub struct StyleSkill;

fn normalize_tags(raw: impl IntoIterator<Item = String>, explicit: bool) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.into_iter().map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty()) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    let has_rating = tags.iter().any(|t| t == "explicit" || t == "clean");
    if has_rating {
        let keep = if explicit { "explicit" } else { "clean" };
        tags.retain(|t| (t != "explicit" && t != "clean") || t == keep);
        if !tags.iter().any(|t| t == keep) {
            tags.push(keep.to_string());
        }
    }
    tags
}

#[async_trait]
impl StageSkill for StyleSkill {
    fn name(&self) -> &str {
        "style"
    }

    fn node(&self) -> NodeName {
        NodeName::Style
    }

    fn input_schema(&self) -> Option<PayloadSchema> {
        Some(PayloadSchema::new().field(keys::MANIFEST, FieldType::Object)
                                 .field(keys::PLAN, FieldType::Object))
    }

    async fn run(&self, input: &Payload, ctx: &WorkflowContext, _params: &GenerationParams) -> Result<Payload, StageError> {
        let manifest = inputs::manifest(input)?;
        let blueprint = inputs::blueprint(input)?;
        let request = &manifest.style;

        let tempo_bpm = match (request.tempo_bpm, blueprint.rules.tempo_bpm) {
            (Some(bpm), Some(range)) => {
                let clamped = range.clamp(bpm);
                if clamped != bpm {
                    log::debug!("tempo {bpm} clamped to {clamped} ({}-{})", range.min, range.max);
                }
                clamped
            }
            (Some(bpm), None) => bpm,
            (None, Some(range)) => seeded_rng(ctx.seed, "style:tempo").gen_range(range.min..=range.max),
            (None, None) => DEFAULT_TEMPO,
        };

        let key = request.key.clone().filter(|k| !k.trim().is_empty()).unwrap_or_else(|| {
                                                                              KEYS.choose(&mut seeded_rng(ctx.seed, "style:key"))
                                                                                  .copied()
                                                                                  .unwrap_or("C major")
                                                                                  .to_string()
                                                                          });
        let mood = request.mood.clone().filter(|m| !m.trim().is_empty()).unwrap_or_else(|| {
                                                                              MOODS.choose(&mut seeded_rng(ctx.seed, "style:mood"))
                                                                                   .copied()
                                                                                   .unwrap_or("hopeful")
                                                                                   .to_string()
                                                                          });
        let instrumentation = if request.instrumentation.is_empty() {
            INSTRUMENTS.choose_multiple(&mut seeded_rng(ctx.seed, "style:instrumentation"), 3).map(|s| s.to_string()).collect()
        } else {
            request.instrumentation.clone()
        };

        let genre = Some(manifest.genre.trim().to_string()).filter(|g| !g.is_empty()).or_else(|| blueprint.genre.clone());
        let tags = normalize_tags(genre.iter().cloned().chain([mood.clone()]).chain(request.tags.iter().cloned()),
                                  manifest.lyrics.explicit);

        let style = StyleArtifact { genre,
                                    tempo_bpm,
                                    key,
                                    mood,
                                    instrumentation,
                                    tags };
        inputs::encode(&style)
    }

    fn summarize(&self, output: &Payload) -> StageSummary {
        let tempo = output.get("tempo_bpm").and_then(|v| v.as_f64()).unwrap_or(0.0);
        StageSummary { metrics: [("tempo_bpm".to_string(), tempo)].into_iter().collect(),
                       issues:  Vec::new() }
    }
}
