//! Revision feedback handed to the writer on re-entry.

use std::fmt::Write as _;

use crate::core::types::IterationSnapshot;

/// Build writer-facing feedback from the pass that triggered a revision.
///
/// Sections: compliance issues (errors first, then warnings), the reviewer's
/// creative feedback, and concrete revision instructions for whichever bar was
/// missed.
pub fn revision_feedback(snapshot: &IterationSnapshot, creative_threshold: f64) -> String {
    let mut out = String::new();
    let errors: Vec<_> = snapshot.compliance.errors().collect();
    let warnings: Vec<_> = snapshot
        .compliance
        .violations
        .iter()
        .filter(|violation| !errors.contains(violation))
        .collect();

    if !errors.is_empty() || !warnings.is_empty() {
        out.push_str("COMPLIANCE ISSUES:\n");
        for violation in &errors {
            let _ = writeln!(out, "- {}", violation.detail);
        }
        for violation in &warnings {
            let _ = writeln!(out, "- (advisory) {}", violation.detail);
        }
        out.push('\n');
    }

    let creative = snapshot.review.feedback.trim();
    if !creative.is_empty() {
        let _ = writeln!(
            out,
            "CREATIVE FEEDBACK (score {:.1}/10):\n{creative}\n",
            snapshot.review.score
        );
    }

    out.push_str("REVISION INSTRUCTIONS:\n");
    if !snapshot.compliance.passed {
        out.push_str("- Fix every compliance issue listed above\n");
    }
    if snapshot.compliance.has_structural_failure() {
        out.push_str("- Follow the template structure exactly\n");
    }
    if snapshot.review.score < creative_threshold {
        out.push_str("- Increase creative impact and persona alignment\n");
        out.push_str("- Make the hook more provocative\n");
    }
    if snapshot.compliance.passed && snapshot.review.score >= creative_threshold {
        out.push_str("- Keep what works and tighten the wording\n");
    }

    out.trim_end().to_string()
}
