use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};

use song_core::generation::{GenerationError, GenerationRequest, SeededMockGenerator, TextGenerator};
use song_domain::{Blueprint, LyricsArtifact, MixTargets, ProducerNotesArtifact, SectionNote, StyleArtifact};
use song_policies::{score_lyrics, FixEngine, FixInput, FixOutcome, Metric};

/// Returns canned responses in order and records the prompts it saw.
#[derive(Debug, Default)]
struct Scripted {
    responses: Mutex<Vec<String>>,
    prompts:   Mutex<Vec<String>>,
}

impl Scripted {
    fn new(responses: &[&str]) -> Self {
        Self { responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
               prompts:   Mutex::default() }
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(request.user_prompt.clone());
        self.responses.lock().unwrap().pop().ok_or(GenerationError::Empty)
    }
}

#[derive(Debug)]
struct Down;

#[async_trait]
impl TextGenerator for Down {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable("offline".into()))
    }
}

fn lyrics(text: &str) -> LyricsArtifact {
    LyricsArtifact { text:             text.to_string(),
                     section_order:    vec![],
                     hook:             "Hold the line".to_string(),
                     rhyme_scheme:     "ABAB".to_string(),
                     citations:        vec![],
                     citation_sources: vec![] }
}

fn style() -> StyleArtifact {
    StyleArtifact { genre:           Some("pop".into()),
                    tempo_bpm:       120,
                    key:             "C major".into(),
                    mood:            "hopeful".into(),
                    instrumentation: vec!["piano".into()],
                    tags:            vec!["pop".into()] }
}

fn notes(names: &[&str]) -> ProducerNotesArtifact {
    let mut notes = ProducerNotesArtifact { structure:       String::new(),
                                            sections:        names.iter()
                                                                  .map(|n| SectionNote { name:        n.to_string(),
                                                                                         energy:      0.5,
                                                                                         arrangement: "full".into() })
                                                                  .collect(),
                                            mix:             MixTargets::default(),
                                            instrumentation: vec!["piano".into()] };
    notes.refresh_structure();
    notes
}

fn input(text: &str, issues: &[&str], required: &[&str], banned: &[&str], seed: u64) -> FixInput {
    FixInput { lyrics:         lyrics(text),
               style:          style(),
               producer_notes: notes(&["Verse", "Chorus"]),
               issues:         issues.iter().map(|s| s.to_string()).collect(),
               blueprint:      Blueprint::from_value(&json!({"rules": {"required_sections": required, "banned_terms": banned}})).unwrap(),
               seed,
               temperature:    0.7 }
}

#[tokio::test]
async fn renamed_required_section_rolls_back_byte_identical() {
    let text = "[Verse]\none two\nthree four\n\n[Chorus]\ngo\nwe carry every promise down the river\n";
    let generator = Arc::new(Scripted::new(&["[Refrain]\nfirst new line\nsecond new line"]));
    let engine = FixEngine::new(generator.clone());
    let fix = input(text, &["singability below target: 0.50 < 0.80"], &["Verse", "Chorus"], &[], 7);
    let original = fix.clone();

    let result = engine.apply(fix).await.unwrap();

    assert!(matches!(result.outcome, FixOutcome::Reverted { .. }));
    assert_eq!(result.lyrics.text, original.lyrics.text);
    assert_eq!(result.lyrics, original.lyrics);
    assert_eq!(result.producer_notes, original.producer_notes);
    assert!(result.fixes_applied.iter().any(|f| f.contains("REVERTED")));
    assert!(generator.prompts.lock().unwrap()[0].contains("[Chorus]"));
}

#[tokio::test]
async fn missing_bridge_goes_before_last_chorus() {
    let text = "[Verse]\na\nb\n\n[Chorus]\nc\nd\n\n[Verse]\ne\nf\n\n[Chorus]\ng\nh";
    let engine = FixEngine::new(Arc::new(SeededMockGenerator::new()));
    let fix = input(text,
                    &["section_completeness below target: 0.67 < 1.00; missing sections: Bridge"],
                    &["Verse", "Chorus", "Bridge"],
                    &[],
                    3);

    let result = engine.apply(fix).await.unwrap();

    assert_eq!(result.outcome, FixOutcome::Applied);
    assert_eq!(result.lyrics.section_order, vec!["Verse", "Chorus", "Verse", "Bridge", "Chorus"]);
    assert!(result.lyrics.text.starts_with("[Verse]\na\nb\n\n[Chorus]\nc\nd\n\n[Verse]\ne\nf\n\n[Bridge]\n"));
    assert!(result.lyrics.text.ends_with("[Chorus]\ng\nh"));
    assert_eq!(result.producer_notes.structure, "Verse-Bridge-Chorus");
    assert_eq!(result.plan, vec![Metric::SectionCompleteness]);
}

#[tokio::test]
async fn missing_chorus_is_appended_with_the_hook() {
    let blueprint_required = ["Verse", "Chorus"];
    let text = "[Verse]\nWe run the road tonight\nWe chase the morning light";
    let engine = FixEngine::new(Arc::new(SeededMockGenerator::new()));
    let fix = input(text,
                    &["section_completeness below target: 0.50 < 1.00; missing sections: Chorus"],
                    &blueprint_required,
                    &[],
                    42);
    let blueprint = fix.blueprint.clone();

    let result = engine.apply(fix).await.unwrap();

    assert_eq!(result.outcome, FixOutcome::Applied);
    assert!(result.lyrics.text.contains("\n\n[Chorus]\nHold the line\n"));
    let report = score_lyrics(&result.lyrics.text, &blueprint, false, Some("ABAB"), 0.85).unwrap();
    assert_eq!(report.metric(Metric::SectionCompleteness), 1.0);
}

#[tokio::test]
async fn failed_generation_keeps_prior_text() {
    let text = "[Verse]\na\nb\n\n[Chorus]\nc";
    let engine = FixEngine::new(Arc::new(Down));
    let result = engine.apply(input(text, &["hook_density below target: 0.40 < 0.70"], &["Verse"], &[], 1)).await.unwrap();

    assert_eq!(result.outcome, FixOutcome::Applied);
    assert_eq!(result.lyrics.text, text);
    assert_eq!(result.fixes_applied, vec!["hook_density: repair failed: generation backend unavailable: offline"]);
}

#[tokio::test]
async fn banned_terms_are_masked_even_without_rewrite() {
    let text = "[Verse]\nDamn the rain\nall day\n";
    let engine = FixEngine::new(Arc::new(Down));
    let result = engine.apply(input(text, &["profanity: banned terms found: damn"], &[], &["damn"], 1)).await.unwrap();

    assert_eq!(result.lyrics.text, "[Verse]\n**** the rain\nall day\n");
    assert_eq!(result.plan, vec![Metric::ProfanityScore]);
}

#[tokio::test]
async fn profanity_rewrite_replaces_only_offending_lines() {
    let text = "[Verse]\nDamn the rain\nall day\n";
    let engine = FixEngine::new(Arc::new(Scripted::new(&["Curse the rain"])));
    let result = engine.apply(input(text, &["profanity: banned terms found: damn"], &[], &["damn"], 1)).await.unwrap();

    assert_eq!(result.lyrics.text, "[Verse]\nCurse the rain\nall day\n");
}

#[tokio::test]
async fn same_inputs_same_repairs() {
    let text = "[Verse]\none\ntwo three four five six\nseven\neight nine\n\n[Chorus]\nHold the line";
    let issues = ["hook_density below target: 0.20 < 0.70", "singability below target: 0.30 < 0.80"];
    let engine = FixEngine::new(Arc::new(SeededMockGenerator::new()));
    let a = engine.apply(input(text, &issues, &["Verse", "Chorus"], &[], 11)).await.unwrap();
    let b = engine.apply(input(text, &issues, &["Verse", "Chorus"], &[], 11)).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn all_missing_sections_come_from_one_request() {
    let text = "[Verse]\na\nb";
    let generator = Arc::new(Scripted::new(&["[Chorus]\nwe sing it loud\nwe sing it clear\nwe sing it true\n[Bridge]\nquiet now\nthen rise"]));
    let engine = FixEngine::new(generator.clone());
    let fix = input(text,
                    &["section_completeness below target: 0.33 < 1.00; missing sections: Chorus, Bridge"],
                    &["Verse", "Chorus", "Bridge"],
                    &[],
                    5);

    let result = engine.apply(fix).await.unwrap();

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("[Chorus] (3 lines)") && prompts[0].contains("[Bridge] (2 lines)"));
    assert_eq!(result.outcome, FixOutcome::Applied);
    let bridge = result.lyrics.text.find("[Bridge]\nquiet now\nthen rise").unwrap();
    let chorus = result.lyrics.text.find("[Chorus]\nHold the line\nwe sing it loud\nwe sing it clear\nwe sing it true").unwrap();
    assert!(bridge < chorus);
    assert_eq!(result.producer_notes.structure, "Verse-Chorus-Bridge-Chorus");
}
