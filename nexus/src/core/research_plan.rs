//! Research query decomposition and deterministic fact merging.

use std::collections::HashSet;

use crate::core::types::Fact;

/// Upper bound on sub-queries per run, regardless of configuration.
pub const MAX_QUERIES: usize = 5;

const ANGLES: [&str; 4] = ["statistics", "latest research", "case study", "expert analysis"];

/// Decompose a topic into at most `max_queries` search queries.
///
/// The plan is the topic itself followed by fixed angles on it. Blank topics
/// yield no queries; case-insensitive duplicates are dropped.
pub fn plan_queries(topic: &str, max_queries: usize) -> Vec<String> {
    let topic = collapse_whitespace(topic);
    if topic.is_empty() {
        return Vec::new();
    }
    let limit = max_queries.clamp(1, MAX_QUERIES);
    let candidates =
        std::iter::once(topic.clone()).chain(ANGLES.iter().map(|angle| format!("{topic} {angle}")));

    let mut seen = HashSet::new();
    candidates
        .filter(|query| seen.insert(query.to_lowercase()))
        .take(limit)
        .collect()
}

/// Merge per-query results in query order, then result order.
///
/// Blank snippets are discarded, facts whose normalized text was already seen
/// are skipped, and the list is capped at `max_facts`.
pub fn merge_facts(per_query: Vec<Vec<Fact>>, max_facts: usize) -> Vec<Fact> {
    let mut seen = HashSet::new();
    per_query
        .into_iter()
        .flatten()
        .filter_map(|fact| {
            let text = fact.text.trim();
            if text.is_empty() {
                return None;
            }
            let key = collapse_whitespace(text).to_lowercase();
            seen.insert(key).then(|| Fact::new(text, fact.source.trim()))
        })
        .take(max_facts)
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
