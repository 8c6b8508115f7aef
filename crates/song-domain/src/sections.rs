//! Lyric sheet structure.
//!
//! A section starts at a line beginning with `[` (the name runs to the
//! closing `]`) and extends to the next marker or the end of the text. Blank
//! lines neither end a section nor belong to it; lines before the first
//! marker belong to no section.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub lines: Vec<String>,
}

/// Position of a section inside the raw text lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub name: String,
    /// Index of the marker line.
    pub start: usize,
    /// One past the last line of the section region (next marker or EOF).
    pub end: usize,
    /// Indices of the non-blank lyric lines.
    pub line_indices: Vec<usize>,
}

fn marker_name(line: &str) -> Option<String> {
    let rest = line.trim().strip_prefix('[')?;
    let name = match rest.find(']') {
        Some(i) => &rest[..i],
        None => rest,
    };
    Some(name.trim().to_string())
}

fn spans_of(lines: &[String]) -> Vec<SectionSpan> {
    let mut spans: Vec<SectionSpan> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if let Some(name) = marker_name(line) {
            if let Some(prev) = spans.last_mut() {
                prev.end = i;
            }
            spans.push(SectionSpan { name,
                                     start: i,
                                     end: lines.len(),
                                     line_indices: Vec::new() });
        } else if !line.trim().is_empty() {
            if let Some(current) = spans.last_mut() {
                current.line_indices.push(i);
            }
        }
    }
    spans
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

pub fn section_spans(text: &str) -> Vec<SectionSpan> {
    spans_of(&split_lines(text))
}

/// Sections in text order. Repeated names stay separate entries.
pub fn parse_sections(text: &str) -> Vec<Section> {
    let lines = split_lines(text);
    spans_of(&lines).into_iter()
                    .map(|span| Section { lines: span.line_indices.iter().map(|i| lines[*i].trim().to_string()).collect(),
                                          name: span.name })
                    .collect()
}

/// Name to lines, in first-appearance order; repeated names are merged.
pub fn sections_map(text: &str) -> IndexMap<String, Vec<String>> {
    let mut map: IndexMap<String, Vec<String>> = IndexMap::new();
    for section in parse_sections(text) {
        map.entry(section.name).or_default().extend(section.lines);
    }
    map
}

pub fn is_chorus_like(name: &str) -> bool {
    let n = name.to_lowercase();
    n.contains("chorus") || n.contains("hook") || n.contains("refrain")
}

pub fn is_verse_or_chorus(name: &str) -> bool {
    name.to_lowercase().contains("verse") || is_chorus_like(name)
}

/// Planned line count for a section when nothing else asks for one.
pub fn default_line_target(name: &str) -> usize {
    let n = name.to_lowercase();
    if n.contains("verse") || is_chorus_like(name) {
        4
    } else {
        2
    }
}

/// True if some section name contains `required` (case-insensitive), so
/// "Chorus 2" satisfies "Chorus".
pub fn has_section(sections: &[Section], required: &str) -> bool {
    let needle = required.to_lowercase();
    sections.iter().any(|s| s.name.to_lowercase().contains(&needle))
}

/// Line-addressable lyric text for targeted edits. Untouched lines render
/// back exactly as they were.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricSheet {
    lines: Vec<String>,
    trailing_newline: bool,
}

impl LyricSheet {
    pub fn parse(text: &str) -> Self {
        Self { lines: split_lines(text),
               trailing_newline: text.ends_with('\n') }
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn spans(&self) -> Vec<SectionSpan> {
        spans_of(&self.lines)
    }

    pub fn sections(&self) -> Vec<Section> {
        parse_sections(&self.lines.join("\n"))
    }

    pub fn has_section(&self, required: &str) -> bool {
        has_section(&self.sections(), required)
    }

    pub fn non_blank_count(&self) -> usize {
        self.lines.iter().filter(|l| !l.trim().is_empty()).count()
    }

    fn block(name: &str, body: &[String]) -> Vec<String> {
        std::iter::once(format!("[{name}]")).chain(body.iter().map(|l| l.trim().to_string())).collect()
    }

    /// Inserts a new section right before line `at` (usually a marker).
    pub fn insert_section_before(&mut self, at: usize, name: &str, body: &[String]) {
        let at = at.min(self.lines.len());
        let mut block = Self::block(name, body);
        block.push(String::new());
        self.lines.splice(at..at, block);
    }

    pub fn append_section(&mut self, name: &str, body: &[String]) {
        if self.lines.last().is_some_and(|l| !l.trim().is_empty()) {
            self.lines.push(String::new());
        }
        self.lines.extend(Self::block(name, body));
    }

    /// Adds `line` after the last lyric line of `span`.
    pub fn append_to_section(&mut self, span: &SectionSpan, line: &str) {
        let at = span.line_indices.last().map(|i| i + 1).unwrap_or(span.start + 1);
        self.lines.insert(at.min(self.lines.len()), line.trim().to_string());
    }

    /// Replaces the lyric lines of `span` with `body` and, when given, its
    /// marker line. Trailing blank lines of the region are kept.
    pub fn replace_section(&mut self, span: &SectionSpan, marker: Option<&str>, body: &[String]) {
        if let Some(marker) = marker {
            if let Some(line) = self.lines.get_mut(span.start) {
                *line = marker.trim().to_string();
            }
        }
        let from = span.start + 1;
        let to = span.line_indices.last().map(|i| i + 1).unwrap_or(from);
        let to = to.min(self.lines.len());
        self.lines.splice(from..to, body.iter().map(|l| l.trim().to_string()));
    }

    pub fn set_line(&mut self, index: usize, text: &str) {
        if let Some(line) = self.lines.get_mut(index) {
            *line = text.trim().to_string();
        }
    }

    /// Rewrites every non-marker line with `f`.
    pub fn map_lyric_lines(&mut self, mut f: impl FnMut(&str) -> String) {
        for line in self.lines.iter_mut() {
            if marker_name(line).is_none() && !line.trim().is_empty() {
                *line = f(line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reference_sheet() {
        let map = sections_map("[Verse]\nA\nB\n\n[Chorus]\nC");
        let expected: IndexMap<String, Vec<String>> = [("Verse".to_string(), vec!["A".to_string(), "B".to_string()]),
                                                       ("Chorus".to_string(), vec!["C".to_string()])].into_iter()
                                                                                                     .collect();
        assert_eq!(map, expected);
    }

    #[test]
    fn preamble_and_blank_lines_are_ignored() {
        let sections = parse_sections("title line\n\n[Intro]\n\n  la la  \n\n[Verse 1]\nx");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0], Section { name: "Intro".into(), lines: vec!["la la".into()] });
        assert_eq!(sections[1].name, "Verse 1");
    }

    #[test]
    fn marker_without_closing_bracket() {
        let sections = parse_sections("[Bridge\nline");
        assert_eq!(sections[0].name, "Bridge");
        assert_eq!(sections[0].lines, vec!["line"]);
    }

    #[test]
    fn repeated_names_stay_separate() {
        let text = "[Chorus]\na\n[Verse]\nb\n[Chorus]\nc";
        assert_eq!(parse_sections(text).len(), 3);
        assert_eq!(sections_map(text)["Chorus"], vec!["a", "c"]);
    }

    #[test]
    fn section_kinds() {
        assert!(is_chorus_like("Final Chorus"));
        assert!(is_chorus_like("Post-Hook"));
        assert!(is_chorus_like("Refrain"));
        assert!(!is_chorus_like("Bridge"));
        assert!(is_verse_or_chorus("Verse 2"));
        assert!(!is_verse_or_chorus("Outro"));
    }

    #[test]
    fn line_targets() {
        assert_eq!(default_line_target("Verse 1"), 4);
        assert_eq!(default_line_target("Chorus"), 4);
        assert_eq!(default_line_target("Bridge"), 2);
        assert_eq!(default_line_target("Outro"), 2);
    }

    #[test]
    fn has_section_tolerates_suffixes() {
        let sections = parse_sections("[Chorus 2]\nx");
        assert!(has_section(&sections, "chorus"));
        assert!(!has_section(&sections, "Bridge"));
    }

    #[test]
    fn sheet_round_trips_untouched_text() {
        let text = "[Verse]\n  A  \n\n[Chorus]\nC\n";
        assert_eq!(LyricSheet::parse(text).render(), text);
    }

    #[test]
    fn sheet_edits() {
        let mut sheet = LyricSheet::parse("[Verse]\nA\nB\n\n[Chorus]\nC");
        let chorus = sheet.spans()[1].clone();
        sheet.insert_section_before(chorus.start, "Bridge", &["X".to_string()]);
        assert_eq!(sheet.render(), "[Verse]\nA\nB\n\n[Bridge]\nX\n\n[Chorus]\nC");

        sheet.append_section("Outro", &["Z".to_string()]);
        assert!(sheet.render().ends_with("[Chorus]\nC\n\n[Outro]\nZ"));

        let verse = sheet.spans()[0].clone();
        sheet.replace_section(&verse, None, &["P".to_string(), "Q".to_string()]);
        assert!(sheet.render().starts_with("[Verse]\nP\nQ\n\n[Bridge]"));

        let verse = sheet.spans()[0].clone();
        sheet.append_to_section(&verse, "R");
        assert_eq!(sheet.sections()[0].lines, vec!["P", "Q", "R"]);
        assert_eq!(sheet.non_blank_count(), 11);
    }
}
