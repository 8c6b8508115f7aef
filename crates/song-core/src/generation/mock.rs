use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;

use super::{GenerationError, GenerationRequest, TextGenerator};
use crate::model::seeded_rng;

const OPENERS: &[&str] = &["we", "you", "I", "they", "the night", "the city", "my heart", "the river"];
const VERBS: &[&str] = &["run", "hold", "light", "call", "carry", "chase", "follow", "remember"];
const OBJECTS: &[&str] = &["the morning", "a fire", "the rain", "the sky", "a promise", "the road", "the tide", "a song"];
const ENDINGS: &[&str] = &["tonight", "so bright", "in flight", "again", "till then", "the end", "below", "we know"];

// "4 lines", "Return 3 lines" ...
static LINE_HINT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)\b(\d{1,3})\s+lines?\b").ok());

/// Deterministic generator: the output is a pure function of
/// `(system, user_prompt, seed)`. Honors an "N lines" hint in the prompt and
/// defaults to four lines.
#[derive(Debug, Clone, Default)]
pub struct SeededMockGenerator;

impl SeededMockGenerator {
    pub fn new() -> Self {
        Self
    }

    fn requested_lines(prompt: &str) -> usize {
        LINE_HINT.as_ref()
                 .and_then(|re| re.captures(prompt))
                 .and_then(|c| c.get(1))
                 .and_then(|m| m.as_str().parse::<usize>().ok())
                 .filter(|n| *n > 0)
                 .unwrap_or(4)
    }
}

#[async_trait]
impl TextGenerator for SeededMockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let salt = format!("{}\u{1f}{}", request.system, request.user_prompt);
        let mut rng = seeded_rng(request.seed, &salt);
        let n = Self::requested_lines(&request.user_prompt);
        let mut lines = Vec::with_capacity(n);
        for _ in 0..n {
            let opener = pick(&mut rng, OPENERS);
            let verb = pick(&mut rng, VERBS);
            let object = pick(&mut rng, OBJECTS);
            let line = if rng.gen_bool(0.5) {
                format!("{opener} {verb} {object} {}", pick(&mut rng, ENDINGS))
            } else {
                format!("{opener} {verb} {object}")
            };
            lines.push(capitalize(&line));
        }
        Ok(lines.join("\n"))
    }
}

fn pick(rng: &mut StdRng, words: &[&'static str]) -> &'static str {
    words.choose(rng).copied().unwrap_or("la")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
