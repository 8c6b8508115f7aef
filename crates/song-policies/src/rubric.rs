//! Rubric scorer.
//!
//! Five metrics, each in `[0, 1]`, combined by a weighted sum:
//!
//! - `hook_density`: share of lines carrying a chorus-derived hook.
//! - `singability`: evenness of syllable counts inside each section.
//! - `rhyme_tightness`: end-word rhymes along the declared scheme.
//! - `section_completeness`: required sections present.
//! - `profanity_score`: banned terms absent (or allowed as explicit).
//!
//! Metrics are always visited in `Metric::ALL` order so issue lists and
//! reports are stable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use song_core::constants::DEFAULT_PASS_THRESHOLD;
use song_core::hashing::hash_serializable;
use song_core::model::ArtifactKind;
use song_core::typed_artifact;
use song_domain::sections::{has_section, is_chorus_like, is_verse_or_chorus, parse_sections, Section};
use song_domain::{count_syllables, Blueprint};

use crate::ScoringError;

/// Neutral rhyme score when no section can be checked against the scheme.
pub const NEUTRAL_RHYME_SCORE: f64 = 0.75;
pub const DEFAULT_RHYME_SCHEME: &str = "ABAB";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    HookDensity,
    Singability,
    RhymeTightness,
    SectionCompleteness,
    ProfanityScore,
}

impl Metric {
    pub const ALL: [Metric; 5] = [Metric::HookDensity,
                                  Metric::Singability,
                                  Metric::RhymeTightness,
                                  Metric::SectionCompleteness,
                                  Metric::ProfanityScore];

    pub fn key(self) -> &'static str {
        match self {
            Metric::HookDensity => "hook_density",
            Metric::Singability => "singability",
            Metric::RhymeTightness => "rhyme_tightness",
            Metric::SectionCompleteness => "section_completeness",
            Metric::ProfanityScore => "profanity_score",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim() {
            "hook_density" => Some(Metric::HookDensity),
            "singability" => Some(Metric::Singability),
            "rhyme_tightness" => Some(Metric::RhymeTightness),
            "section_completeness" => Some(Metric::SectionCompleteness),
            "profanity_score" | "profanity" => Some(Metric::ProfanityScore),
            _ => None,
        }
    }

    pub fn default_weight(self) -> f64 {
        match self {
            Metric::HookDensity => 0.25,
            Metric::Singability => 0.20,
            Metric::RhymeTightness => 0.15,
            Metric::SectionCompleteness => 0.20,
            Metric::ProfanityScore => 0.20,
        }
    }

    /// Score under which an issue is reported. Profanity is reported from
    /// the banned terms found instead.
    pub fn soft_target(self) -> Option<f64> {
        match self {
            Metric::HookDensity => Some(0.7),
            Metric::Singability => Some(0.8),
            Metric::RhymeTightness => Some(0.75),
            Metric::SectionCompleteness => Some(1.0),
            Metric::ProfanityScore => None,
        }
    }
}

/// Weights and pass threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Rubric {
    weights:       BTreeMap<Metric, f64>,
    pub threshold: f64,
}

impl Default for Rubric {
    fn default() -> Self {
        Self { weights:   Metric::ALL.iter().map(|m| (*m, m.default_weight())).collect(),
               threshold: DEFAULT_PASS_THRESHOLD }
    }
}

impl Rubric {
    /// Weights from the blueprint (defaults for metrics it omits) and its
    /// `min_total` threshold, else `default_threshold`. Unknown metric names
    /// are ignored. Weights are not required to sum to 1 here.
    pub fn from_blueprint(blueprint: &Blueprint, default_threshold: f64) -> Result<Self, ScoringError> {
        let mut rubric = Rubric { threshold: blueprint.eval_rubric.thresholds.min_total.unwrap_or(default_threshold),
                                  ..Rubric::default() };
        for (name, weight) in &blueprint.eval_rubric.weights {
            if !(*weight >= 0.0) {
                return Err(ScoringError::NegativeWeight { metric: name.clone(),
                                                          weight: *weight });
            }
            match Metric::from_key(name) {
                Some(metric) => {
                    rubric.weights.insert(metric, *weight);
                }
                None => log::debug!("ignoring weight for unknown metric '{name}'"),
            }
        }
        Ok(rubric)
    }

    pub fn weight(&self, metric: Metric) -> f64 {
        self.weights.get(&metric).copied().unwrap_or(0.0)
    }

    pub fn score(&self, text: &str, ctx: &ScoringContext) -> ScoreReport {
        let sections = parse_sections(text);
        let (completeness, missing) = section_completeness(&sections, &ctx.required_sections);
        let (profanity, banned_found) = profanity_score(text, &ctx.banned_terms, ctx.explicit_allowed);

        let mut scores = BTreeMap::new();
        for metric in Metric::ALL {
            let value = match metric {
                Metric::HookDensity => hook_density(&sections),
                Metric::Singability => singability(&sections),
                Metric::RhymeTightness => rhyme_tightness(&sections, &ctx.rhyme_scheme),
                Metric::SectionCompleteness => completeness,
                Metric::ProfanityScore => profanity,
            };
            scores.insert(metric.key().to_string(), value.clamp(0.0, 1.0));
        }

        let total: f64 = Metric::ALL.iter().map(|m| scores[m.key()] * self.weight(*m)).sum();

        let mut issues = Vec::new();
        for metric in Metric::ALL {
            let value = scores[metric.key()];
            match metric.soft_target() {
                Some(target) if value < target => {
                    let mut issue = format!("{} below target: {value:.2} < {target:.2}", metric.key());
                    if metric == Metric::SectionCompleteness && !missing.is_empty() {
                        issue.push_str(&format!("; missing sections: {}", missing.join(", ")));
                    }
                    issues.push(issue);
                }
                Some(_) => {}
                None => {
                    if !banned_found.is_empty() && !ctx.explicit_allowed {
                        issues.push(format!("profanity: banned terms found: {}", banned_found.join(", ")));
                    }
                }
            }
        }

        let provenance_hash = hash_serializable(&scores);
        ScoreReport { total,
                      pass: total >= self.threshold,
                      threshold: self.threshold,
                      margin: total - self.threshold,
                      issues,
                      missing_sections: missing,
                      banned_found,
                      provenance_hash,
                      scores }
    }
}

/// What a lyric sheet is scored against besides its own text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoringContext {
    pub required_sections: Vec<String>,
    pub banned_terms:      Vec<String>,
    pub explicit_allowed:  bool,
    pub rhyme_scheme:      String,
}

impl ScoringContext {
    pub fn from_blueprint(blueprint: &Blueprint, explicit_allowed: bool, rhyme_scheme: Option<&str>) -> Self {
        Self { required_sections: blueprint.required_sections().to_vec(),
               banned_terms: blueprint.banned_terms().to_vec(),
               explicit_allowed,
               rhyme_scheme: rhyme_scheme.unwrap_or(DEFAULT_RHYME_SCHEME).to_string() }
    }
}

typed_artifact!(
    /// Output of VALIDATE.
    ScoreReport kind: ArtifactKind::ScoreReport, {
        /// Metric key to score, every metric present.
        scores: BTreeMap<String, f64>,
        total: f64,
        pass: bool,
        threshold: f64,
        /// `total - threshold`.
        margin: f64,
        issues: Vec<String>,
        missing_sections: Vec<String>,
        banned_found: Vec<String>,
        /// Hash of `scores`.
        provenance_hash: String,
    }
);

impl ScoreReport {
    pub fn metric(&self, metric: Metric) -> f64 {
        self.scores.get(metric.key()).copied().unwrap_or(0.0)
    }
}

/// Scores `text` with the rubric and rules of `blueprint`.
pub fn score_lyrics(text: &str,
                    blueprint: &Blueprint,
                    explicit_allowed: bool,
                    rhyme_scheme: Option<&str>,
                    default_threshold: f64)
                    -> Result<ScoreReport, ScoringError> {
    let rubric = Rubric::from_blueprint(blueprint, default_threshold)?;
    Ok(rubric.score(text, &ScoringContext::from_blueprint(blueprint, explicit_allowed, rhyme_scheme)))
}

/// Lowercased word tokens, punctuation dropped (apostrophes kept).
pub(crate) fn words(line: &str) -> Vec<String> {
    line.split_whitespace()
        .map(|w| w.chars().filter(|c| c.is_alphanumeric() || *c == '\'').flat_map(char::to_lowercase).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect()
}

fn contains_run(hay: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && hay.windows(needle.len()).any(|w| w == needle)
}

/// Hook phrases: every 3-word run of chorus lines, plus the chorus lines
/// themselves. Empty when the song has no chorus-type section.
fn hook_phrases(sections: &[Section]) -> BTreeSet<Vec<String>> {
    let mut hooks = BTreeSet::new();
    for section in sections.iter().filter(|s| is_chorus_like(&s.name)) {
        for line in &section.lines {
            let tokens = words(line);
            if tokens.is_empty() {
                continue;
            }
            for gram in tokens.windows(3) {
                hooks.insert(gram.to_vec());
            }
            hooks.insert(tokens);
        }
    }
    hooks
}

pub fn line_has_hook(line: &str, sections: &[Section]) -> bool {
    let hooks = hook_phrases(sections);
    let tokens = words(line);
    hooks.iter().any(|h| contains_run(&tokens, h))
}

pub fn hook_density(sections: &[Section]) -> f64 {
    let hooks = hook_phrases(sections);
    if hooks.is_empty() {
        return 0.0;
    }
    let lines: Vec<&String> = sections.iter().flat_map(|s| s.lines.iter()).collect();
    if lines.is_empty() {
        return 0.0;
    }
    let hits = lines.iter()
                    .filter(|line| {
                        let tokens = words(line);
                        hooks.iter().any(|h| contains_run(&tokens, h))
                    })
                    .count();
    hits as f64 / lines.len() as f64
}

/// Singability of one section, `None` when it has fewer than two lines or
/// no syllables.
pub fn section_singability(section: &Section) -> Option<f64> {
    if section.lines.len() < 2 {
        return None;
    }
    let counts: Vec<f64> = section.lines.iter().map(|l| count_syllables(l) as f64).collect();
    let n = counts.len() as f64;
    let mean = counts.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(1.0 - (variance.sqrt() / mean).min(1.0))
}

pub fn singability(sections: &[Section]) -> f64 {
    average(sections.iter().filter_map(section_singability)).unwrap_or(0.0)
}

fn scheme_letters(scheme: &str) -> Vec<char> {
    let letters: Vec<char> = scheme.chars().filter(|c| c.is_alphabetic()).flat_map(char::to_uppercase).collect();
    if letters.is_empty() {
        DEFAULT_RHYME_SCHEME.chars().collect()
    } else {
        letters
    }
}

fn rhyme_tail(line: &str) -> String {
    let last: String = line.split_whitespace()
                           .last()
                           .unwrap_or("")
                           .chars()
                           .filter(|c| c.is_alphanumeric())
                           .flat_map(char::to_lowercase)
                           .collect();
    let chars: Vec<char> = last.chars().collect();
    chars[chars.len().saturating_sub(2)..].iter().collect()
}

/// Rhyme score of one verse/chorus section over its complete scheme
/// repetitions. `None` if the section does not qualify or the scheme has no
/// rhyming pair.
pub fn section_rhyme(section: &Section, scheme: &str) -> Option<f64> {
    let letters = scheme_letters(scheme);
    if !is_verse_or_chorus(&section.name) || section.lines.len() < letters.len() {
        return None;
    }
    let mut pairs = 0usize;
    let mut matches = 0usize;
    for block in section.lines.chunks_exact(letters.len()) {
        for i in 0..letters.len() {
            for j in (i + 1)..letters.len() {
                if letters[i] != letters[j] {
                    continue;
                }
                pairs += 1;
                let (a, b) = (rhyme_tail(&block[i]), rhyme_tail(&block[j]));
                if !a.is_empty() && a == b {
                    matches += 1;
                }
            }
        }
    }
    (pairs > 0).then(|| matches as f64 / pairs as f64)
}

pub fn rhyme_tightness(sections: &[Section], scheme: &str) -> f64 {
    average(sections.iter().filter_map(|s| section_rhyme(s, scheme))).unwrap_or(NEUTRAL_RHYME_SCORE)
}

/// Share of required sections present, and the missing ones in required
/// order.
pub fn section_completeness(sections: &[Section], required: &[String]) -> (f64, Vec<String>) {
    let required: Vec<&String> = required.iter().filter(|r| !r.trim().is_empty()).collect();
    if required.is_empty() {
        return (1.0, Vec::new());
    }
    let missing: Vec<String> = required.iter().filter(|r| !has_section(sections, r.trim())).map(|r| r.trim().to_string()).collect();
    ((required.len() - missing.len()) as f64 / required.len() as f64, missing)
}

static WORD_CHAR: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\w").ok());

/// Case-insensitive, word-bounded matcher for a banned term.
pub(crate) fn term_pattern(term: &str) -> Option<Regex> {
    let escaped = regex::escape(term.trim());
    let bounded = WORD_CHAR.as_ref().is_some_and(|re| re.is_match(term.trim()));
    let pattern = if bounded { format!(r"(?i)\b{escaped}\b") } else { format!("(?i){escaped}") };
    Regex::new(&pattern).ok()
}

/// Profanity score and the banned terms found, in blueprint order.
pub fn profanity_score(text: &str, banned: &[String], explicit_allowed: bool) -> (f64, Vec<String>) {
    let mut found: Vec<String> = Vec::new();
    for term in banned.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if found.iter().any(|f| f.eq_ignore_ascii_case(term)) {
            continue;
        }
        let hit = match term_pattern(term) {
            Some(re) => re.is_match(text),
            None => text.to_lowercase().contains(&term.to_lowercase()),
        };
        if hit {
            found.push(term.to_string());
        }
    }
    let score = match (found.is_empty(), explicit_allowed) {
        (true, _) => 1.0,
        (false, true) => 0.9,
        (false, false) => 0.0,
    };
    (score, found)
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}
