//! Whitespace normalization applied to every generated draft, and the final
//! polish applied to a published one.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::Platform;

static EXCESS_BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Thread indicator required on twitter drafts.
pub const THREAD_MARKER: &str = "🧵";

/// Normalize raw generator output into a publishable draft.
///
/// Line endings become `\n`, trailing spaces are stripped, runs of blank lines
/// collapse to one, and outer whitespace is trimmed. Twitter drafts get the
/// thread marker appended when missing. Blank input stays blank.
pub fn normalize_draft(raw: &str, platform: Platform) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let stripped: Vec<&str> = unified.lines().map(str::trim_end).collect();
    let joined = stripped.join("\n");
    let collapsed = EXCESS_BLANK_LINES.replace_all(&joined, "\n\n");
    let mut draft = collapsed.trim().to_string();

    if platform == Platform::Twitter && !draft.is_empty() && !draft.contains(THREAD_MARKER) {
        let first_break = draft.find("\n\n").unwrap_or(draft.len());
        draft.insert_str(first_break, &format!("\n\n{THREAD_MARKER}"));
    }
    draft
}

/// Final polish for a draft that is being published.
///
/// Blank-line runs collapse to one. LinkedIn renders single breaks poorly, so
/// every line break there becomes a paragraph break.
pub fn polish_for_publish(draft: &str, platform: Platform) -> String {
    let mut text = EXCESS_BLANK_LINES.replace_all(draft, "\n\n").into_owned();
    if platform == Platform::Linkedin {
        text = text.replace('\n', "\n\n");
        text = EXCESS_BLANK_LINES.replace_all(&text, "\n\n").into_owned();
    }
    text.trim().to_string()
}
