//! Typed stage outputs.

use song_core::model::ArtifactKind;
use song_core::typed_artifact;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTarget {
    pub name: String,
    pub lines: usize,
}

typed_artifact!(
    /// Song plan: the section order every later stage follows.
    PlanArtifact kind: ArtifactKind::Plan, {
        section_order: Vec<String>,
        targets: Vec<SectionTarget>,
        #[serde(default)]
        evaluation_targets: serde_json::Value,
        work_items: Vec<String>,
    }
);

impl PlanArtifact {
    pub fn target_lines(&self, section: &str) -> Option<usize> {
        self.targets.iter().find(|t| t.name == section).map(|t| t.lines)
    }
}

typed_artifact!(
    StyleArtifact kind: ArtifactKind::Style, {
        #[serde(default)]
        genre: Option<String>,
        tempo_bpm: u32,
        key: String,
        mood: String,
        instrumentation: Vec<String>,
        tags: Vec<String>,
    }
);

typed_artifact!(
    /// Full lyric sheet with `[Section]` markers.
    LyricsArtifact kind: ArtifactKind::Lyrics, {
        text: String,
        section_order: Vec<String>,
        hook: String,
        rhyme_scheme: String,
        /// Chunk hashes, in retrieval order.
        #[serde(default)]
        citations: Vec<String>,
        #[serde(default)]
        citation_sources: Vec<String>,
    }
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionNote {
    pub name: String,
    pub energy: f64,
    pub arrangement: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixTargets {
    pub lufs: f64,
    pub stereo_width: String,
}

impl Default for MixTargets {
    fn default() -> Self {
        Self { lufs:         -14.0,
               stereo_width: "wide".to_string() }
    }
}

typed_artifact!(
    ProducerNotesArtifact kind: ArtifactKind::ProducerNotes, {
        structure: String,
        sections: Vec<SectionNote>,
        mix: MixTargets,
        instrumentation: Vec<String>,
    }
);

impl ProducerNotesArtifact {
    /// Re-derives the structure string from the section notes.
    pub fn refresh_structure(&mut self) {
        self.structure = self.sections.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join("-");
    }
}

typed_artifact!(
    ComposedPromptArtifact kind: ArtifactKind::ComposedPrompt, {
        text: String,
        char_count: usize,
        limit: usize,
        truncated: bool,
        /// Volatile; excluded from content hashes.
        compiled_at: String,
    }
);

typed_artifact!(
    /// Closing summary of a run.
    ReviewSummaryArtifact kind: ArtifactKind::ReviewSummary, {
        total: f64,
        pass: bool,
        fix_iterations: u32,
        artifact_hashes: std::collections::BTreeMap<String, String>,
        citations: Vec<String>,
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use song_core::model::ArtifactSpec;

    #[test]
    fn plan_targets_lookup() {
        let plan = PlanArtifact { section_order: vec!["Verse".into(), "Chorus".into()],
                                  targets: vec![SectionTarget { name: "Verse".into(), lines: 4 }],
                                  evaluation_targets: Value::Null,
                                  work_items: vec![] };
        assert_eq!(plan.target_lines("Verse"), Some(4));
        assert_eq!(plan.target_lines("Bridge"), None);
    }

    #[test]
    fn lyrics_decode_ignores_metadata_keys() {
        let lyrics = LyricsArtifact { text: "[Verse]\nA".into(),
                                      section_order: vec!["Verse".into()],
                                      hook: "A".into(),
                                      rhyme_scheme: "ABAB".into(),
                                      citations: vec![],
                                      citation_sources: vec![] };
        let mut payload = lyrics.to_payload().unwrap();
        payload.insert("_hash".into(), Value::from("abc"));
        let back = LyricsArtifact::from_value(&Value::Object(payload)).unwrap();
        assert_eq!(back, lyrics);
    }

    #[test]
    fn structure_follows_sections() {
        let mut notes = ProducerNotesArtifact { structure: String::new(),
                                                sections: vec![SectionNote { name: "Verse".into(), energy: 0.4, arrangement: "sparse".into() },
                                                               SectionNote { name: "Chorus".into(), energy: 0.8, arrangement: "full".into() }],
                                                mix: MixTargets::default(),
                                                instrumentation: vec![] };
        notes.refresh_structure();
        assert_eq!(notes.structure, "Verse-Chorus");
        assert_eq!(notes.mix.lufs, -14.0);
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let style = StyleArtifact { genre: None,
                                    tempo_bpm: 120,
                                    key: "C major".into(),
                                    mood: "warm".into(),
                                    instrumentation: vec![],
                                    tags: vec![] };
        let payload = Value::Object(style.to_payload().unwrap());
        assert!(LyricsArtifact::from_value(&payload).is_err());
    }
}
