use async_trait::async_trait;
use std::sync::Arc;

use song_core::constants::keys;
use song_core::generation::{GenerationRequest, TextGenerator};
use song_core::model::{NodeName, Payload, WorkflowContext};
use song_core::skill::{FieldType, GenerationParams, PayloadSchema, StageSkill, StageSummary};
use song_core::StageError;
use song_domain::sections::{default_line_target, is_chorus_like};
use song_domain::{LyricsArtifact, PlanArtifact, SongManifest, StyleArtifact};
use song_providers::{Citation, CitationRetriever};

use crate::inputs;

pub const DEFAULT_TOP_K: usize = 3;
const DEFAULT_RHYME_SCHEME: &str = "ABAB";
const SYSTEM_PROMPT: &str = "You are a lyricist. Return only lyric lines, one per line, without section markers.";

/// Writes the lyric sheet section by section, grounded on retrieved
/// citations when the manifest asks for them.
#[derive(Debug, Clone)]
pub struct LyricsSkill {
    generator: Arc<dyn TextGenerator>,
    retriever: Option<Arc<CitationRetriever>>,
}

impl LyricsSkill {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator,
               retriever: None }
    }

    pub fn with_retriever(mut self, retriever: Arc<CitationRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Citations for the manifest, or none when retrieval is not configured
    /// or fails.
    async fn citations(&self, manifest: &SongManifest, seed: u64) -> Vec<Citation> {
        let request = &manifest.citations;
        let Some(retriever) = &self.retriever else {
            return Vec::new();
        };
        if request.sources.is_empty() && request.pinned_hashes.is_empty() {
            return Vec::new();
        }
        let query = request.query.clone().unwrap_or_else(|| manifest.title.clone());
        match retriever.retrieve(&request.sources,
                                 &query,
                                 &request.pinned_hashes,
                                 request.top_k.unwrap_or(DEFAULT_TOP_K),
                                 seed)
                       .await
        {
            Ok(citations) => citations,
            Err(e) => {
                log::warn!("citation retrieval failed, continuing without citations: {e}");
                Vec::new()
            }
        }
    }
}

fn clean_lines(text: &str, wanted: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('['))
        .take(wanted)
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl StageSkill for LyricsSkill {
    fn name(&self) -> &str {
        "lyrics"
    }

    fn node(&self) -> NodeName {
        NodeName::Lyrics
    }

    fn input_schema(&self) -> Option<PayloadSchema> {
        Some(PayloadSchema::new().field(keys::MANIFEST, FieldType::Object)
                                 .field(keys::PLAN, FieldType::Object)
                                 .field(keys::STYLE, FieldType::Object))
    }

    fn output_schema(&self) -> Option<PayloadSchema> {
        Some(PayloadSchema::new().field("text", FieldType::String)
                                 .field("hook", FieldType::String))
    }

    async fn run(&self, input: &Payload, ctx: &WorkflowContext, params: &GenerationParams) -> Result<Payload, StageError> {
        let manifest = inputs::manifest(input)?;
        let blueprint = inputs::blueprint(input)?;
        let plan: PlanArtifact = inputs::artifact(input, keys::PLAN)?;
        let style: StyleArtifact = inputs::artifact(input, keys::STYLE)?;

        let citations = self.citations(&manifest, ctx.seed).await;
        let hook = manifest.hook();
        let rhyme_scheme = manifest.lyrics
                                   .rhyme_scheme
                                   .clone()
                                   .filter(|s| !s.trim().is_empty())
                                   .unwrap_or_else(|| DEFAULT_RHYME_SCHEME.to_string());

        let mut context = format!("Song: \"{}\". Genre: {}. Mood: {}. Rhyme scheme: {rhyme_scheme}.",
                                  manifest.title,
                                  style.genre.as_deref().unwrap_or("unspecified"),
                                  style.mood);
        if !manifest.lyrics.themes.is_empty() {
            context.push_str(&format!(" Themes: {}.", manifest.lyrics.themes.join(", ")));
        }
        if !blueprint.rules.lexicon.is_empty() {
            context.push_str(&format!(" Prefer words like: {}.", blueprint.rules.lexicon.join(", ")));
        }
        if !blueprint.banned_terms().is_empty() && !manifest.lyrics.explicit {
            context.push_str(&format!(" Never use: {}.", blueprint.banned_terms().join(", ")));
        }
        for citation in &citations {
            context.push_str(&format!("\nSource: {}", citation.text));
        }

        let mut blocks = Vec::with_capacity(plan.section_order.len());
        for (position, name) in plan.section_order.iter().enumerate() {
            let target = plan.target_lines(name).unwrap_or_else(|| default_line_target(name)).max(1);
            let chorus = is_chorus_like(name);
            let wanted = if chorus { target - 1 } else { target };

            let mut lines = Vec::with_capacity(target);
            if chorus {
                lines.push(hook.clone());
            }
            if wanted > 0 {
                let prompt = format!("Write {wanted} lines for the [{name}] section. {context}");
                let request = GenerationRequest::new(SYSTEM_PROMPT, prompt, params.temperature, ctx.seed.wrapping_add(position as u64));
                let text = self.generator.generate(&request).await?;
                lines.extend(clean_lines(&text, wanted));
            }
            blocks.push(format!("[{name}]\n{}", lines.join("\n")));
        }

        let lyrics = LyricsArtifact { text: blocks.join("\n\n"),
                                      section_order: plan.section_order.clone(),
                                      hook,
                                      rhyme_scheme,
                                      citations: citations.iter().map(|c| c.chunk_hash.clone()).collect(),
                                      citation_sources: citations.iter().map(|c| c.source_id.clone()).collect() };
        inputs::encode(&lyrics)
    }

    fn summarize(&self, output: &Payload) -> StageSummary {
        let lines = output.get("text")
                          .and_then(|v| v.as_str())
                          .map_or(0, |t| t.lines().filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('[')).count());
        let citations = output.get("citations").and_then(|v| v.as_array()).map_or(0, Vec::len);
        StageSummary { metrics: [("lines".to_string(), lines as f64), ("citations".to_string(), citations as f64)].into_iter().collect(),
                       issues:  Vec::new() }
    }
}
