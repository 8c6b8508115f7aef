use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("negative weight {weight} for metric '{metric}'")]
    NegativeWeight { metric: String, weight: f64 },
    #[error("issue pattern failed to compile: {0}")]
    Pattern(String),
}

/// A repair removed a required section that was present before it ran.
/// Handled inside the fix engine by rolling back; never surfaced as a run
/// failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("structural regression: missing required sections: {}", .missing.join(", "))]
pub struct StructuralRegression {
    pub missing: Vec<String>,
}
