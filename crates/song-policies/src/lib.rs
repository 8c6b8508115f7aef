//! song-policies: quality policies applied to generated songs.
//!
//! - `rubric`: the weighted multi-metric scorer behind VALIDATE.
//! - `fix`: issue triage and targeted repair behind FIX, with rollback when
//!   a repair breaks required structure.
pub mod errors;
pub mod fix;
pub mod rubric;

pub use errors::{ScoringError, StructuralRegression};
pub use fix::{prioritize, triage_issues, FixEngine, FixInput, FixOutcome, FixReport, FixResult, TriagedIssues};
pub use rubric::{hook_density, profanity_score, rhyme_tightness, score_lyrics, section_completeness, singability, Metric, Rubric,
                 ScoreReport, ScoringContext};
