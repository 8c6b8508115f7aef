//! Genre blueprint: structural rules plus the evaluation rubric.
//!
//! The engine never reads blueprint files; it receives this structure as
//! plain JSON (`{rules: {...}, eval_rubric: {weights, thresholds}}`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoRange {
    pub min: u32,
    pub max: u32,
}

impl TempoRange {
    pub fn clamp(&self, bpm: u32) -> u32 {
        bpm.clamp(self.min, self.max)
    }

    pub fn contains(&self, bpm: u32) -> bool {
        (self.min..=self.max).contains(&bpm)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlueprintRules {
    #[serde(default)]
    pub tempo_bpm: Option<TempoRange>,
    #[serde(default)]
    pub required_sections: Vec<String>,
    #[serde(default)]
    pub banned_terms: Vec<String>,
    /// Preferred vocabulary, passed to generation prompts.
    #[serde(default)]
    pub lexicon: Vec<String>,
    /// Maximum characters of the composed prompt.
    #[serde(default)]
    pub prompt_char_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub min_total: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalRubric {
    /// Metric name to weight. Missing metrics use the default weight.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub rules: BlueprintRules,
    #[serde(default)]
    pub eval_rubric: EvalRubric,
}

impl Blueprint {
    /// Decodes and checks a blueprint received as JSON. `null` yields the
    /// empty blueprint.
    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let bp: Blueprint = serde_json::from_value(value.clone()).map_err(|e| DomainError::Malformed { what: "blueprint",
                                                                                                        message: e.to_string() })?;
        bp.validate()?;
        Ok(bp)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(range) = self.rules.tempo_bpm {
            if range.min > range.max {
                return Err(DomainError::ValidationError(format!("tempo range inverted: {} > {}", range.min, range.max)));
            }
        }
        Ok(())
    }

    pub fn required_sections(&self) -> &[String] {
        &self.rules.required_sections
    }

    pub fn banned_terms(&self) -> &[String] {
        &self.rules.banned_terms
    }
}
