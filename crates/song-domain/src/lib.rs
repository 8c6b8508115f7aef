//! song-domain: song data consumed and produced by the pipeline.
//!
//! - `Blueprint` and `SongManifest`: already-parsed rule and request data.
//! - Typed artifacts for every stage output.
//! - Lyric sheet parsing (`[Section]` markers) and syllable counting, shared
//!   by the scorer and the fix engine.
pub mod artifacts;
pub mod blueprint;
pub mod errors;
pub mod manifest;
pub mod sections;
pub mod syllables;

pub use artifacts::{ComposedPromptArtifact, LyricsArtifact, MixTargets, PlanArtifact, ProducerNotesArtifact, ReviewSummaryArtifact,
                    SectionNote, SectionTarget, StyleArtifact};
pub use blueprint::{Blueprint, BlueprintRules, EvalRubric, TempoRange, Thresholds};
pub use errors::DomainError;
pub use manifest::{CitationRequest, LyricsRequest, ProducerRequest, SongManifest, StyleRequest};
pub use sections::{default_line_target, has_section, is_chorus_like, is_verse_or_chorus, parse_sections, section_spans, sections_map, LyricSheet, Section, SectionSpan};
pub use syllables::{count_syllables, word_syllables};
