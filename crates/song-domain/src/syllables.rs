//! Vowel-run syllable estimate.

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

/// Syllables in one word: vowel runs over its letters, minus a trailing
/// silent `e` when more than one run remains, at least 1. Tokens without
/// letters count 0.
pub fn word_syllables(word: &str) -> usize {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).flat_map(char::to_lowercase).collect();
    if letters.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut prev_vowel = false;
    for &c in &letters {
        let vowel = is_vowel(c);
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }
    if count > 1 && letters.last() == Some(&'e') {
        count -= 1;
    }
    count.max(1)
}

pub fn count_syllables(line: &str) -> usize {
    line.split_whitespace().map(word_syllables).sum()
}
