//! Content intent and SEO keyword for a topic.
//!
//! The analyzer reply is parsed leniently: a JSON object when the model
//! follows the contract, `INTENT:`/`CONFIDENCE:`/`REASONING:` lines when it
//! does not. A missing keyword always falls back to the longest topic word, so
//! parsing never fails.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::metrics;

pub const DEFAULT_INTENT: &str = "educational";
pub const DEFAULT_CONFIDENCE: &str = "medium";

/// Intent categories offered to the analyzer.
pub const INTENT_CATEGORIES: [&str; 10] = [
    "educational",
    "inspirational",
    "controversial",
    "story",
    "data",
    "list",
    "opinion",
    "apology",
    "launch",
    "guide",
];

static INTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:PRIMARY[_\s])?INTENT:\s*(\w+)").unwrap());
static CONFIDENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CONFIDENCE:\s*(\w+)").unwrap());
static REASONING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)REASONING:\s*(.+?)(?:\n\s*\n|$)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIntent {
    pub primary_intent: String,
    pub confidence: String,
    pub reasoning: String,
    /// Main searchable term; drives the keyword-density check.
    pub primary_keyword: String,
    pub secondary_keywords: Vec<String>,
}

impl ContentIntent {
    /// Educational intent keyed on the longest topic word.
    pub fn fallback(topic: &str) -> Self {
        Self {
            primary_intent: DEFAULT_INTENT.to_string(),
            confidence: DEFAULT_CONFIDENCE.to_string(),
            reasoning: String::new(),
            primary_keyword: metrics::primary_keyword(topic).unwrap_or_default(),
            secondary_keywords: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IntentReply {
    primary_intent: Option<String>,
    confidence: Option<String>,
    reasoning: Option<String>,
    primary_keyword: Option<String>,
    secondary_keywords: Vec<String>,
}

/// Parse an analyzer reply for `topic`.
pub fn parse_intent(raw: &str, topic: &str) -> ContentIntent {
    let mut intent = ContentIntent::fallback(topic);
    match json_reply(raw) {
        Some(reply) => {
            if let Some(value) = clean(reply.primary_intent) {
                intent.primary_intent = value.to_lowercase();
            }
            if let Some(value) = clean(reply.confidence) {
                intent.confidence = value.to_lowercase();
            }
            if let Some(value) = clean(reply.reasoning) {
                intent.reasoning = value;
            }
            if let Some(value) = clean(reply.primary_keyword) {
                intent.primary_keyword = value.to_lowercase();
            }
            intent.secondary_keywords = reply
                .secondary_keywords
                .into_iter()
                .filter_map(|keyword| clean(Some(keyword)))
                .collect();
        }
        None => {
            if let Some(value) = capture(&INTENT_RE, raw) {
                intent.primary_intent = value.to_lowercase();
            }
            if let Some(value) = capture(&CONFIDENCE_RE, raw) {
                intent.confidence = value.to_lowercase();
            }
            if let Some(value) = capture(&REASONING_RE, raw) {
                intent.reasoning = value;
            }
        }
    }
    intent
}

fn json_reply(raw: &str) -> Option<IntentReply> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    let value: Value = serde_json::from_str(&raw[start..=end]).ok()?;
    serde_json::from_value(value).ok()
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn capture(re: &Regex, raw: &str) -> Option<String> {
    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_reply_sets_keyword() {
        let raw = r#"Sure:
{"primary_intent": "Guide", "confidence": "high", "reasoning": "How-to topic",
 "primary_keyword": "RAG systems", "secondary_keywords": ["retrieval", " "]}"#;
        let intent = parse_intent(raw, "Complete Guide to RAG Systems");
        assert_eq!(
            intent,
            ContentIntent {
                primary_intent: "guide".to_string(),
                confidence: "high".to_string(),
                reasoning: "How-to topic".to_string(),
                primary_keyword: "rag systems".to_string(),
                secondary_keywords: vec!["retrieval".to_string()],
            }
        );
    }

    #[test]
    fn blank_keyword_falls_back_to_longest_topic_word() {
        let raw = r#"{"primary_intent": "data", "primary_keyword": ""}"#;
        let intent = parse_intent(raw, "AI for remote teams");
        assert_eq!(intent.primary_intent, "data");
        assert_eq!(intent.primary_keyword, "remote");
    }

    #[test]
    fn text_reply_uses_labelled_lines() {
        let raw = "PRIMARY_INTENT: Opinion\nCONFIDENCE: low\nREASONING: It is a hot take.\n\nExtra.";
        let intent = parse_intent(raw, "remote work");
        assert_eq!(intent.primary_intent, "opinion");
        assert_eq!(intent.confidence, "low");
        assert_eq!(intent.reasoning, "It is a hot take.");
        assert_eq!(intent.primary_keyword, "remote");
    }

    #[test]
    fn unusable_reply_is_the_fallback() {
        assert_eq!(
            parse_intent("no idea", "remote work"),
            ContentIntent::fallback("remote work")
        );
    }
}
