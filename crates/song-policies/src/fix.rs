//! Fix engine: turns VALIDATE issues into minimal, targeted repairs.
//!
//! Issues are triaged into metric flags, ordered (profanity, structure, then
//! the weakest remaining metric first) and repaired one at a time, each step
//! working on the previous step's output. After the last step the result is
//! checked for structural regressions; losing a required section rolls the
//! whole fix back to the original artifacts.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

use song_core::generation::{GenerationRequest, TextGenerator};
use song_core::model::ArtifactKind;
use song_core::typed_artifact;
use song_domain::sections::{default_line_target, is_chorus_like, LyricSheet, SectionSpan};
use song_domain::{Blueprint, LyricsArtifact, ProducerNotesArtifact, SectionNote, StyleArtifact};

use crate::rubric::{line_has_hook, section_rhyme, section_singability, term_pattern, Metric};
use crate::{ScoringError, StructuralRegression};

const SYSTEM_PROMPT: &str = "You repair song lyrics with minimal edits. Change only what you are asked to change.";

/// Minimum share of non-blank lines a fix may leave before it is reported.
const LINE_RETENTION: f64 = 0.7;

/// Flags and details extracted from issue strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriagedIssues {
    /// Flagged metrics, first-seen order.
    pub flags:            Vec<Metric>,
    pub scores:           BTreeMap<Metric, f64>,
    pub missing_sections: Vec<String>,
    pub banned_terms:     Vec<String>,
}

impl TriagedIssues {
    fn flag(&mut self, metric: Metric) {
        if !self.flags.contains(&metric) {
            self.flags.push(metric);
        }
    }

    pub fn has(&self, metric: Metric) -> bool {
        self.flags.contains(&metric)
    }
}

struct IssuePatterns {
    below:    Regex,
    missing:  Regex,
    banned:   Regex,
}

static PATTERNS: Lazy<Result<IssuePatterns, regex::Error>> = Lazy::new(|| {
    Ok(IssuePatterns { below:   Regex::new(r"(?i)^\s*(hook_density|singability|rhyme_tightness|section_completeness)\s+below target:\s*([0-9]*\.?[0-9]+)")?,
                       missing: Regex::new(r"(?i)missing sections?:\s*(.+)$")?,
                       banned:  Regex::new(r"(?i)^\s*profanity(?:_score)?\b.*?banned terms? found:\s*(.+)$")? })
});

fn split_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parses issue strings as produced by the rubric scorer. Unrecognised
/// strings are skipped.
pub fn triage_issues(issues: &[String]) -> Result<TriagedIssues, ScoringError> {
    let patterns = PATTERNS.as_ref().map_err(|e| ScoringError::Pattern(e.to_string()))?;
    let mut triaged = TriagedIssues::default();
    for issue in issues {
        if let Some(caps) = patterns.banned.captures(issue) {
            triaged.flag(Metric::ProfanityScore);
            for term in split_list(caps.get(1).map_or("", |m| m.as_str())) {
                if !triaged.banned_terms.contains(&term) {
                    triaged.banned_terms.push(term);
                }
            }
            continue;
        }
        if let Some(caps) = patterns.below.captures(issue) {
            let metric = caps.get(1).and_then(|m| Metric::from_key(&m.as_str().to_lowercase()));
            if let Some(metric) = metric {
                triaged.flag(metric);
                if let Some(score) = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok()) {
                    triaged.scores.insert(metric, score);
                }
            }
        }
        if let Some(caps) = patterns.missing.captures(issue) {
            triaged.flag(Metric::SectionCompleteness);
            for name in split_list(caps.get(1).map_or("", |m| m.as_str())) {
                if !triaged.missing_sections.contains(&name) {
                    triaged.missing_sections.push(name);
                }
            }
        }
    }
    Ok(triaged)
}

/// Repair order: profanity, then section completeness, then the remaining
/// flagged metrics by ascending score (ties in `Metric::ALL` order).
pub fn prioritize(triaged: &TriagedIssues) -> Vec<Metric> {
    let mut order = Vec::new();
    for metric in [Metric::ProfanityScore, Metric::SectionCompleteness] {
        if triaged.has(metric) {
            order.push(metric);
        }
    }
    let mut rest: Vec<Metric> = [Metric::HookDensity, Metric::Singability, Metric::RhymeTightness].into_iter()
                                                                                                  .filter(|m| triaged.has(*m))
                                                                                                  .collect();
    rest.sort_by(|a, b| {
            let sa = triaged.scores.get(a).copied().unwrap_or(1.0);
            let sb = triaged.scores.get(b).copied().unwrap_or(1.0);
            sa.total_cmp(&sb)
        });
    order.extend(rest);
    order
}

/// Artifacts and context handed to one fix invocation.
#[derive(Debug, Clone)]
pub struct FixInput {
    pub lyrics:         LyricsArtifact,
    pub style:          StyleArtifact,
    pub producer_notes: ProducerNotesArtifact,
    pub issues:         Vec<String>,
    pub blueprint:      Blueprint,
    pub seed:           u64,
    pub temperature:    f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FixOutcome {
    Applied,
    Reverted { reason: StructuralRegression },
}

impl FixOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixOutcome::Applied => "applied",
            FixOutcome::Reverted { .. } => "reverted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixResult {
    pub lyrics:         LyricsArtifact,
    pub style:          StyleArtifact,
    pub producer_notes: ProducerNotesArtifact,
    pub fixes_applied:  Vec<String>,
    /// Metrics in the order they were repaired.
    pub plan:           Vec<Metric>,
    pub outcome:        FixOutcome,
}

typed_artifact!(
    /// Summary of one FIX call.
    FixReport kind: ArtifactKind::FixReport, {
        fixes_applied: Vec<String>,
        plan: Vec<String>,
        outcome: String,
        #[serde(default)]
        reason: Option<String>,
    }
);

impl From<&FixResult> for FixReport {
    fn from(result: &FixResult) -> Self {
        FixReport { fixes_applied: result.fixes_applied.clone(),
                    plan:          result.plan.iter().map(|m| m.key().to_string()).collect(),
                    outcome:       result.outcome.as_str().to_string(),
                    reason:        match &result.outcome {
                        FixOutcome::Applied => None,
                        FixOutcome::Reverted { reason } => Some(reason.to_string()),
                    } }
    }
}

/// Working copy threaded through the repair steps.
struct Draft {
    sheet:    LyricSheet,
    notes:    ProducerNotesArtifact,
    applied:  Vec<String>,
    calls:    u64,
}

#[derive(Debug, Clone)]
pub struct FixEngine {
    generator: Arc<dyn TextGenerator>,
}

impl FixEngine {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Runs every prioritized repair and the structural self-check. Never
    /// fails: a repair whose generation fails keeps the previous text and
    /// leaves a note in `fixes_applied`.
    pub async fn apply(&self, input: FixInput) -> Result<FixResult, ScoringError> {
        let triaged = triage_issues(&input.issues)?;
        let plan = prioritize(&triaged);
        log::debug!("fix plan: {:?}", plan.iter().map(|m| m.key()).collect::<Vec<_>>());

        let mut draft = Draft { sheet:   LyricSheet::parse(&input.lyrics.text),
                                notes:   input.producer_notes.clone(),
                                applied: Vec::new(),
                                calls:   0 };

        for metric in &plan {
            match metric {
                Metric::ProfanityScore => self.fix_profanity(&mut draft, &input, &triaged).await,
                Metric::SectionCompleteness => self.fix_missing_sections(&mut draft, &input, &triaged).await,
                Metric::HookDensity => self.fix_hook(&mut draft, &input).await,
                Metric::Singability | Metric::RhymeTightness => self.rewrite_weakest(&mut draft, &input, *metric).await,
            }
        }

        let original = LyricSheet::parse(&input.lyrics.text);
        let lost: Vec<String> = input.blueprint
                                     .required_sections()
                                     .iter()
                                     .filter(|r| original.has_section(r) && !draft.sheet.has_section(r))
                                     .cloned()
                                     .collect();
        if !lost.is_empty() {
            let reason = StructuralRegression { missing: lost };
            log::warn!("fix reverted: {reason}");
            let mut fixes_applied = draft.applied;
            fixes_applied.push(format!("REVERTED: {reason}"));
            return Ok(FixResult { lyrics: input.lyrics,
                                  style: input.style,
                                  producer_notes: input.producer_notes,
                                  fixes_applied,
                                  plan,
                                  outcome: FixOutcome::Reverted { reason } });
        }

        let before = original.non_blank_count();
        let after = draft.sheet.non_blank_count();
        if (after as f64) < (before as f64) * LINE_RETENTION {
            log::warn!("fix kept {after} of {before} non-blank lines");
        }

        let mut lyrics = input.lyrics;
        lyrics.text = draft.sheet.render();
        lyrics.section_order = draft.sheet.sections().into_iter().map(|s| s.name).collect();
        Ok(FixResult { lyrics,
                       style: input.style,
                       producer_notes: draft.notes,
                       fixes_applied: draft.applied,
                       plan,
                       outcome: FixOutcome::Applied })
    }

    async fn generate(&self, draft: &mut Draft, input: &FixInput, prompt: String) -> Result<Vec<String>, String> {
        let request = GenerationRequest::new(SYSTEM_PROMPT, prompt, input.temperature, input.seed.wrapping_add(draft.calls));
        draft.calls += 1;
        let text = self.generator.generate(&request).await.map_err(|e| e.to_string())?;
        Ok(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
    }

    /// Writes every missing section from one generator call. The response
    /// is split on `[Name]` markers; unmarked lines fill sections in order.
    async fn fix_missing_sections(&self, draft: &mut Draft, input: &FixInput, triaged: &TriagedIssues) {
        let mut missing = triaged.missing_sections.clone();
        if missing.is_empty() {
            missing = input.blueprint.required_sections().to_vec();
        }
        let mut seen = Vec::new();
        let missing: Vec<(String, usize)> = missing.into_iter()
                                                   .filter(|name| !draft.sheet.has_section(name))
                                                   .filter(|name| {
                                                       let key = name.to_lowercase();
                                                       let fresh = !seen.contains(&key);
                                                       seen.push(key);
                                                       fresh
                                                   })
                                                   .map(|name| {
                                                       let target = default_line_target(&name);
                                                       let wanted = if is_chorus_like(&name) { target - 1 } else { target };
                                                       (name, wanted)
                                                   })
                                                   .collect();
        if missing.is_empty() {
            return;
        }

        let total: usize = missing.iter().map(|(_, wanted)| wanted).sum();
        let layout = missing.iter()
                            .map(|(name, wanted)| format!("[{name}] ({wanted} lines)"))
                            .collect::<Vec<_>>()
                            .join(", ");
        let prompt = format!("Write {total} lines in total for the missing sections, each under its own marker: {layout}. Hook: \"{}\". \
                              Do not rewrite unrelated lines.",
                             input.lyrics.hook);
        let response = match self.generate(draft, input, prompt).await {
            Ok(lines) => lines,
            Err(e) => {
                let names = missing.iter().map(|(name, _)| format!("[{name}]")).collect::<Vec<_>>().join(", ");
                log::warn!("repair of missing sections {names} failed: {e}");
                draft.applied.push(format!("section_completeness: could not write {names}: {e}"));
                return;
            }
        };
        let bodies = split_section_bodies(&response, &missing);

        for ((name, _), mut body) in missing.into_iter().zip(bodies) {
            let chorus = is_chorus_like(&name);
            if chorus {
                body.insert(0, input.lyrics.hook.clone());
            }

            let spans = draft.sheet.spans();
            let last_chorus = spans.iter().rposition(|s| is_chorus_like(&s.name));
            let bridge = name.to_lowercase().contains("bridge");
            let note = SectionNote { name:        name.clone(),
                                     energy:      if chorus { 0.8 } else { 0.5 },
                                     arrangement: "added during repair".to_string() };
            match (bridge, last_chorus) {
                (true, Some(i)) => {
                    draft.sheet.insert_section_before(spans[i].start, &name, &body);
                    let at = draft.notes.sections.iter().rposition(|n| is_chorus_like(&n.name)).unwrap_or(draft.notes.sections.len());
                    draft.notes.sections.insert(at, note);
                    draft.applied.push(format!("section_completeness: inserted [{name}] before the last chorus"));
                }
                _ => {
                    draft.sheet.append_section(&name, &body);
                    draft.notes.sections.push(note);
                    draft.applied.push(format!("section_completeness: appended [{name}]"));
                }
            }
            draft.notes.refresh_structure();
        }
    }

    async fn fix_hook(&self, draft: &mut Draft, input: &FixInput) {
        let hook = input.lyrics.hook.trim().to_string();
        if hook.is_empty() {
            draft.applied.push("hook_density: no hook to repeat".to_string());
            return;
        }
        let prompt = format!("Write 1 line that repeats the hook \"{hook}\" once more. Do not rewrite unrelated lines.");
        let line = match self.generate(draft, input, prompt).await {
            Ok(lines) => lines.into_iter().find(|l| l.to_lowercase().contains(&hook.to_lowercase())).unwrap_or_else(|| hook.clone()),
            Err(e) => {
                log::warn!("hook repair failed: {e}");
                draft.applied.push(format!("hook_density: repair failed: {e}"));
                return;
            }
        };

        let sections = draft.sheet.sections();
        let spans = draft.sheet.spans();
        let target = spans.iter()
                          .zip(sections.iter())
                          .find(|(_, s)| !is_chorus_like(&s.name) && !s.lines.iter().any(|l| line_has_hook(l, &sections)))
                          .map(|(span, _)| span.clone())
                          .or_else(|| spans.iter().find(|s| is_chorus_like(&s.name)).cloned());
        match target {
            Some(span) => {
                draft.sheet.append_to_section(&span, &line);
                draft.applied.push(format!("hook_density: repeated the hook in [{}]", span.name));
            }
            None => {
                draft.sheet.append_section("Chorus", &[line]);
                draft.applied.push("hook_density: added a [Chorus] carrying the hook".to_string());
            }
        }
    }

    /// Rewrites the section scoring worst on `metric`, keeping its line count.
    async fn rewrite_weakest(&self, draft: &mut Draft, input: &FixInput, metric: Metric) {
        let sections = draft.sheet.sections();
        let spans = draft.sheet.spans();
        let scored = spans.iter().zip(sections.iter()).filter_map(|(span, section)| {
                                                          let score = match metric {
                                                              Metric::Singability => section_singability(section),
                                                              _ => section_rhyme(section, &input.lyrics.rhyme_scheme),
                                                          };
                                                          score.map(|s| (span, section, s))
                                                      });
        let worst = scored.fold(None::<(&SectionSpan, &song_domain::Section, f64)>, |acc, item| match acc {
                              Some(best) if best.2 <= item.2 => Some(best),
                              _ => Some(item),
                          });
        let Some((span, section, _)) = worst else {
            draft.applied.push(format!("{}: no section to rewrite", metric.key()));
            return;
        };

        let n = section.lines.len();
        let goal = match metric {
            Metric::Singability => "with even syllable counts".to_string(),
            _ => format!("following the rhyme scheme {}", input.lyrics.rhyme_scheme),
        };
        let prompt = format!("Rewrite {n} lines of the [{}] section {goal}. Keep its meaning; do not touch other sections.\n{}",
                             section.name,
                             section.lines.join("\n"));
        let span = span.clone();
        let name = section.name.clone();
        let mut lines = match self.generate(draft, input, prompt).await {
            Ok(lines) => lines,
            Err(e) => {
                log::warn!("{} repair failed: {e}", metric.key());
                draft.applied.push(format!("{}: repair failed: {e}", metric.key()));
                return;
            }
        };
        let marker = match lines.first() {
            Some(first) if first.starts_with('[') => Some(lines.remove(0)),
            _ => None,
        };
        if lines.len() != n {
            draft.applied.push(format!("{}: kept [{name}], rewrite had {} lines instead of {n}", metric.key(), lines.len()));
            return;
        }
        draft.sheet.replace_section(&span, marker.as_deref(), &lines);
        draft.applied.push(format!("{}: rewrote [{name}]", metric.key()));
    }

    async fn fix_profanity(&self, draft: &mut Draft, input: &FixInput, triaged: &TriagedIssues) {
        let terms: Vec<String> = if triaged.banned_terms.is_empty() {
            input.blueprint.banned_terms().to_vec()
        } else {
            triaged.banned_terms.clone()
        };
        let patterns: Vec<Regex> = terms.iter().filter_map(|t| term_pattern(t)).collect();
        let offending: Vec<usize> = draft.sheet
                                         .lines()
                                         .iter()
                                         .enumerate()
                                         .filter(|(_, l)| !l.trim_start().starts_with('[') && patterns.iter().any(|re| re.is_match(l)))
                                         .map(|(i, _)| i)
                                         .collect();
        if offending.is_empty() {
            return;
        }
        let current: Vec<String> = offending.iter().map(|i| draft.sheet.lines()[*i].trim().to_string()).collect();
        let prompt = format!("Rewrite {} lines without the terms: {}. Keep their rhythm.\n{}",
                             current.len(),
                             terms.join(", "),
                             current.join("\n"));
        match self.generate(draft, input, prompt).await {
            Ok(lines) if lines.len() == offending.len() => {
                for (index, line) in offending.iter().zip(lines.iter()) {
                    draft.sheet.set_line(*index, line);
                }
                draft.applied.push(format!("profanity: rewrote {} lines", offending.len()));
            }
            Ok(_) => draft.applied.push("profanity: rewrite rejected, masking only".to_string()),
            Err(e) => {
                log::warn!("profanity repair failed: {e}");
                draft.applied.push(format!("profanity: repair failed: {e}"));
            }
        }
        draft.sheet.map_lyric_lines(|line| {
                       patterns.iter().fold(line.to_string(), |acc, re| {
                                          re.replace_all(&acc, |caps: &regex::Captures| "*".repeat(caps[0].chars().count())).into_owned()
                                      })
                   });
        draft.applied.push(format!("profanity: masked {}", terms.join(", ")));
    }
}

/// Distributes generated lines over the requested `(name, wanted)` sections.
/// Lines under a matching `[Name]` marker go to that section; the rest top
/// up the sections that are still short, in request order.
fn split_section_bodies(lines: &[String], sections: &[(String, usize)]) -> Vec<Vec<String>> {
    let mut bodies = vec![Vec::new(); sections.len()];
    let mut loose = Vec::new();
    let mut current: Option<usize> = None;
    for line in lines {
        if let Some(marker) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let marker = marker.trim().to_lowercase();
            current = sections.iter().position(|(name, _)| name.to_lowercase() == marker);
            continue;
        }
        match current {
            Some(i) => bodies[i].push(line.clone()),
            None => loose.push(line.clone()),
        }
    }
    let mut loose = loose.into_iter();
    for (body, (_, wanted)) in bodies.iter_mut().zip(sections) {
        body.truncate(*wanted);
        while body.len() < *wanted {
            match loose.next() {
                Some(line) => body.push(line),
                None => break,
            }
        }
    }
    bodies
}
