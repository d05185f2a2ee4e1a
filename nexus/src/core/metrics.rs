//! Deterministic text metrics used by the compliance checks.
//!
//! Every function here is pure. Case-insensitive comparisons lowercase
//! their inputs; nothing else is normalized.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::core::types::Fact;

static SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+|\n").unwrap());

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

/// Characters of context kept on each side of a phrase hit.
pub const CONTEXT_WINDOW: usize = 50;

/// Words of the text: whitespace-separated tokens trimmed of surrounding
/// punctuation, keeping only tokens with at least one alphanumeric character.
pub fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| token.chars().any(char::is_alphanumeric))
}

pub fn word_count(text: &str) -> usize {
    words(text).count()
}

/// Syllable estimate: groups of consecutive vowels, minus a silent final `e`.
/// Every word has at least one syllable.
pub fn count_syllables(word: &str) -> usize {
    let lower = word.to_lowercase();
    let mut groups = 0;
    let mut previous_vowel = false;
    for c in lower.chars() {
        let vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !previous_vowel {
            groups += 1;
        }
        previous_vowel = vowel;
    }
    if groups > 1 && lower.ends_with('e') && !lower.ends_with("le") {
        groups -= 1;
    }
    groups.max(1)
}

/// Sentences are runs of text between terminal punctuation or line breaks
/// that contain at least one word.
pub fn sentence_count(text: &str) -> usize {
    SENTENCE_BREAK
        .split(text)
        .filter(|chunk| words(chunk).next().is_some())
        .count()
}

/// Flesch-Kincaid grade level rounded to one decimal.
///
/// Returns `None` when the text has no words.
pub fn flesch_kincaid_grade(text: &str) -> Option<f64> {
    let mut word_total = 0usize;
    let mut syllables = 0usize;
    for word in words(text) {
        word_total += 1;
        syllables += count_syllables(word);
    }
    if word_total == 0 {
        return None;
    }
    let sentences = sentence_count(text).max(1);
    let grade = 0.39 * (word_total as f64 / sentences as f64)
        + 11.8 * (syllables as f64 / word_total as f64)
        - 15.59;
    Some((grade * 10.0).round() / 10.0)
}

/// First occurrence of a banned phrase in a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseHit {
    pub phrase: String,
    /// Byte offset of the match.
    pub position: usize,
    /// Up to [`CONTEXT_WINDOW`] characters either side of the match.
    pub context: String,
}

/// Case-insensitive, word-bounded matcher for a fixed phrase list.
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    patterns: Vec<(String, Regex)>,
}

impl PhraseMatcher {
    pub fn new<I, S>(phrases: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = Vec::new();
        for phrase in phrases {
            let phrase = phrase.as_ref().trim();
            if phrase.is_empty() {
                continue;
            }
            let regex = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(phrase)))
                .case_insensitive(true)
                .build()?;
            patterns.push((phrase.to_string(), regex));
        }
        Ok(Self { patterns })
    }

    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(phrase, _)| phrase.as_str())
    }

    /// One hit per phrase that occurs, in phrase-list order.
    pub fn find(&self, text: &str) -> Vec<PhraseHit> {
        self.patterns
            .iter()
            .filter_map(|(phrase, regex)| {
                regex.find(text).map(|found| PhraseHit {
                    phrase: phrase.clone(),
                    position: found.start(),
                    context: context_window(text, found.start(), found.end()),
                })
            })
            .collect()
    }
}

fn context_window(text: &str, start: usize, end: usize) -> String {
    let before = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_WINDOW - 1)
        .map_or(0, |(index, _)| index);
    let after = text[end..]
        .char_indices()
        .nth(CONTEXT_WINDOW)
        .map_or(text.len(), |(index, _)| end + index);
    text[before..after].trim().to_string()
}

/// Non-blank paragraphs, separated by one or more blank lines.
pub fn paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}

pub fn line_count(paragraph: &str) -> usize {
    paragraph.lines().count().max(1)
}

/// The opening paragraph of a draft.
pub fn hook(text: &str) -> Option<&str> {
    paragraphs(text).into_iter().next()
}

/// Estimated rendered lines at `chars_per_line` characters per line.
pub fn visual_lines(text: &str, chars_per_line: usize) -> usize {
    let width = chars_per_line.max(1);
    text.lines()
        .map(|line| line.chars().count() / width + 1)
        .sum()
}

/// True when the first line of the draft is followed by an empty line.
pub fn blank_line_after_first(text: &str) -> bool {
    let mut lines = text.trim_start().lines();
    lines.next().is_some() && lines.next().is_some_and(|line| line.trim().is_empty())
}

/// Non-blank segments split on `separator`.
pub fn segments<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return vec![text.trim()];
    }
    text.split(separator)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Longest topic word of at least three characters, lowercased.
pub fn primary_keyword(topic: &str) -> Option<String> {
    words(topic)
        .filter(|word| word.chars().count() >= 3)
        .fold(None, |best: Option<&str>, word| match best {
            Some(current) if current.chars().count() >= word.chars().count() => Some(current),
            _ => Some(word),
        })
        .map(str::to_lowercase)
}

/// Keyword occurrences per hundred words, rounded to two decimals.
pub fn keyword_density(text: &str, keyword: &str) -> f64 {
    let keyword = keyword.trim().to_lowercase();
    let total = word_count(text);
    if keyword.is_empty() || total == 0 {
        return 0.0;
    }
    let hits = text.to_lowercase().matches(keyword.as_str()).count();
    let density = hits as f64 / total as f64 * 100.0;
    (density * 100.0).round() / 100.0
}

/// Share of facts (0-100) whose key terms appear in the draft.
///
/// A fact's key terms are its first three words longer than five characters;
/// a fact counts as used when any of them occurs in the draft. Returns `None`
/// when there are no facts.
pub fn fact_usage_rate(draft: &str, facts: &[Fact]) -> Option<f64> {
    if facts.is_empty() {
        return None;
    }
    let haystack = draft.to_lowercase();
    let used = facts
        .iter()
        .filter(|fact| {
            let text = fact.text.to_lowercase();
            let mut terms = words(&text)
                .filter(|term| term.chars().count() > 5)
                .take(3)
                .peekable();
            terms.peek().is_some() && terms.any(|term| haystack.contains(term))
        })
        .count();
    Some(used as f64 / facts.len() as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syllables_follow_vowel_groups() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("readability"), 5);
        assert_eq!(count_syllables("make"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("rhythm"), 1);
        assert_eq!(count_syllables("42"), 1);
    }

    #[test]
    fn simple_text_has_low_grade() {
        let grade = flesch_kincaid_grade("The cat sat. The dog ran. We had fun.").expect("grade");
        assert!(grade < 2.0, "grade {grade}");
    }

    #[test]
    fn dense_text_has_high_grade() {
        let text = "Organizational transformation initiatives necessitate comprehensive \
                    stakeholder alignment regarding institutional modernization priorities.";
        let grade = flesch_kincaid_grade(text).expect("grade");
        assert!(grade > 15.0, "grade {grade}");
    }

    #[test]
    fn grade_requires_words() {
        assert_eq!(flesch_kincaid_grade("  ... !!! "), None);
        assert_eq!(flesch_kincaid_grade(""), None);
    }

    #[test]
    fn phrases_match_on_word_boundaries_once() {
        let matcher = PhraseMatcher::new(["robust", "paradigm shift", "  "]).expect("matcher");
        assert_eq!(matcher.phrases().count(), 2);

        let hits = matcher.find("A Robust plan. Robustness is not robust. A Paradigm  Shift? no.");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].phrase, "robust");
        assert_eq!(hits[0].position, 2);
    }

    #[test]
    fn phrase_context_is_bounded_and_char_safe() {
        let matcher = PhraseMatcher::new(["delve"]).expect("matcher");
        let text = format!("{}delve{}", "é".repeat(80), "ü".repeat(80));
        let hits = matcher.find(&text);
        let context = &hits[0].context;
        assert_eq!(context.chars().count(), CONTEXT_WINDOW * 2 + "delve".len());
        assert!(context.contains("delve"));
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let text = "Hook line\n\nBody one\nBody two\n  \n\nEnd";
        assert_eq!(paragraphs(text), vec!["Hook line", "Body one\nBody two", "End"]);
        assert_eq!(line_count("Body one\nBody two"), 2);
        assert_eq!(hook(text), Some("Hook line"));
    }

    #[test]
    fn visual_lines_wrap_long_lines() {
        assert_eq!(visual_lines("short", 40), 1);
        assert_eq!(visual_lines(&"x".repeat(85), 40), 3);
        assert_eq!(visual_lines("a\nb", 40), 2);
    }

    #[test]
    fn blank_line_after_first_line() {
        assert!(blank_line_after_first("Hook\n\nBody"));
        assert!(!blank_line_after_first("Hook\nBody"));
        assert!(!blank_line_after_first("Hook only"));
    }

    #[test]
    fn segments_skip_blank_pieces() {
        assert_eq!(segments("one\n\ntwo\n\n\n\nthree", "\n\n"), vec!["one", "two", "three"]);
    }

    #[test]
    fn primary_keyword_is_longest_topic_word() {
        assert_eq!(primary_keyword("AI for remote teams"), Some("remote".to_string()));
        assert_eq!(primary_keyword("a b"), None);
    }

    #[test]
    fn keyword_density_counts_per_hundred_words() {
        let text = format!("remote {}", "word ".repeat(99));
        assert_eq!(keyword_density(&text, "remote"), 1.0);
        assert_eq!(keyword_density("", "remote"), 0.0);
    }

    #[test]
    fn fact_usage_uses_key_terms() {
        let facts = vec![
            Fact::new("Remote workers reported productivity gains", "s1"),
            Fact::new("Quarterly revenue doubled", "s2"),
        ];
        let rate = fact_usage_rate("Remote teams thrived.", &facts).expect("rate");
        assert_eq!(rate, 50.0);
        assert_eq!(fact_usage_rate("anything", &[]), None);
    }
}
