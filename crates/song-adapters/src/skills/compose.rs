use async_trait::async_trait;
use chrono::Utc;

use song_core::constants::keys;
use song_core::model::{NodeName, Payload, WorkflowContext};
use song_core::skill::{FieldType, GenerationParams, PayloadSchema, StageSkill, StageSummary};
use song_core::StageError;
use song_domain::{ComposedPromptArtifact, LyricsArtifact, ProducerNotesArtifact, StyleArtifact};

use crate::inputs;

pub const DEFAULT_PROMPT_CHAR_LIMIT: usize = 3000;

/// Folds style, producer notes and lyrics into one prompt under the
/// blueprint's character limit. Lyrics are cut at a line boundary.
#[derive(Debug, Clone, Default)]
pub struct ComposeSkill;

fn header(style: &StyleArtifact, notes: &ProducerNotesArtifact) -> String {
    let mut out = String::new();
    if let Some(genre) = &style.genre {
        out.push_str(&format!("Genre: {genre}\n"));
    }
    out.push_str(&format!("Tempo: {} BPM\nKey: {}\nMood: {}\n", style.tempo_bpm, style.key, style.mood));
    if !style.instrumentation.is_empty() {
        out.push_str(&format!("Instrumentation: {}\n", style.instrumentation.join(", ")));
    }
    if !style.tags.is_empty() {
        out.push_str(&format!("Tags: {}\n", style.tags.join(", ")));
    }
    out.push_str(&format!("Structure: {}\n", notes.structure));
    for section in &notes.sections {
        out.push_str(&format!("- {} (energy {:.2}): {}\n", section.name, section.energy, section.arrangement));
    }
    out.push_str(&format!("Mix: {:.1} LUFS, {} stereo\n\nLyrics:\n", notes.mix.lufs, notes.mix.stereo_width));
    out
}

/// Joins `head` and as many whole lyric lines as fit in `limit` characters.
fn fit(head: &str, lyrics: &str, limit: usize) -> (String, bool) {
    let mut text: String = head.chars().take(limit).collect();
    let mut used = text.chars().count();
    if used < head.chars().count() {
        return (text, true);
    }
    let mut truncated = false;
    for (i, line) in lyrics.lines().enumerate() {
        let cost = line.chars().count() + usize::from(i > 0);
        if used + cost > limit {
            truncated = true;
            break;
        }
        if i > 0 {
            text.push('\n');
        }
        text.push_str(line);
        used += cost;
    }
    (text, truncated)
}

#[async_trait]
impl StageSkill for ComposeSkill {
    fn name(&self) -> &str {
        "compose"
    }

    fn node(&self) -> NodeName {
        NodeName::Compose
    }

    fn input_schema(&self) -> Option<PayloadSchema> {
        Some(PayloadSchema::new().field(keys::STYLE, FieldType::Object)
                                 .field(keys::LYRICS, FieldType::Object)
                                 .field(keys::PRODUCER_NOTES, FieldType::Object))
    }

    async fn run(&self, input: &Payload, _ctx: &WorkflowContext, _params: &GenerationParams) -> Result<Payload, StageError> {
        let blueprint = inputs::blueprint(input)?;
        let style: StyleArtifact = inputs::artifact(input, keys::STYLE)?;
        let lyrics: LyricsArtifact = inputs::artifact(input, keys::LYRICS)?;
        let notes: ProducerNotesArtifact = inputs::artifact(input, keys::PRODUCER_NOTES)?;

        let limit = blueprint.rules.prompt_char_limit.unwrap_or(DEFAULT_PROMPT_CHAR_LIMIT);
        let (text, truncated) = fit(&header(&style, &notes), &lyrics.text, limit);
        if truncated {
            log::info!("composed prompt truncated to {limit} characters");
        }
        let composed = ComposedPromptArtifact { char_count: text.chars().count(),
                                                text,
                                                limit,
                                                truncated,
                                                compiled_at: Utc::now().to_rfc3339() };
        inputs::encode(&composed)
    }

    fn summarize(&self, output: &Payload) -> StageSummary {
        let chars = output.get("char_count").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let truncated = output.get("truncated").and_then(|v| v.as_bool()).unwrap_or(false);
        StageSummary { metrics: [("char_count".to_string(), chars)].into_iter().collect(),
                       issues:  if truncated { vec!["composed prompt truncated".to_string()] } else { Vec::new() } }
    }
}
