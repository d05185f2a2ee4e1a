//! Decision node: picks the transition after every completed review.
//!
//! Pure functions over [`SharedState`]; the engine owns acting on the result.

use crate::core::state::SharedState;
use crate::core::types::{AbortReason, IterationSnapshot, ReviseTarget, Transition};

/// Choose the next transition for a state whose pass has just been reviewed.
///
/// - `Publish` when compliance passed and the creative score reaches the threshold.
/// - `Abort(MaxIterationsExhausted)` when the bar is missed and no loop-backs remain.
/// - `Revise(Route)` when the bar is missed and compliance reports a structural
///   (template mismatch) failure; `Revise(Write)` otherwise.
///
/// A missing compliance report or review counts as a missed bar.
pub fn decide(state: &SharedState) -> Transition {
    if meets_quality_bar(state) {
        return Transition::Publish;
    }
    if state.iteration_count() >= state.config().max_iterations {
        return Transition::Abort(AbortReason::MaxIterationsExhausted);
    }
    let structural = state
        .compliance()
        .is_some_and(|report| report.has_structural_failure());
    if structural {
        Transition::Revise(ReviseTarget::Route)
    } else {
        Transition::Revise(ReviseTarget::Write)
    }
}

/// True when the current pass clears both the compliance and the creative bar.
pub fn meets_quality_bar(state: &SharedState) -> bool {
    let compliant = state.compliance().is_some_and(|report| report.passed);
    let threshold = state.config().thresholds.creative_threshold;
    let creative = state
        .review()
        .is_some_and(|review| review.score >= threshold);
    compliant && creative
}

/// Pick the best draft from history for a degraded-success result.
///
/// Highest creative score among compliance-passing snapshots; when none passed,
/// highest creative score overall. Ties go to the earliest iteration.
pub fn select_best(history: &[IterationSnapshot]) -> Option<&IterationSnapshot> {
    let any_passing = history.iter().any(|snapshot| snapshot.compliance.passed);
    history
        .iter()
        .filter(|snapshot| !any_passing || snapshot.compliance.passed)
        .fold(None, |best: Option<&IterationSnapshot>, snapshot| match best {
            Some(current) if snapshot.review.score <= current.review.score => Some(current),
            _ => Some(snapshot),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{
        ComplianceMetrics, ComplianceReport, CreativeReview, PersonaSelector, Platform, Rule,
        RunConfig, Severity, Violation,
    };

    fn report(violations: Vec<Violation>) -> ComplianceReport {
        ComplianceReport::from_violations(violations, ComplianceMetrics::default())
    }

    fn violation(rule: Rule) -> Violation {
        Violation {
            rule,
            severity: Severity::Error,
            detail: format!("{rule:?}"),
        }
    }

    fn reviewed_state(compliance: ComplianceReport, score: f64, iteration: u32) -> SharedState {
        let mut state = SharedState::new(
            RunConfig::new("topic", Platform::Linkedin, PersonaSelector::registered("stark"))
                .with_max_iterations(3),
        );
        for _ in 0..iteration {
            state.begin_revision().expect("revision");
        }
        state.set_draft("draft".to_string());
        state.set_compliance(compliance);
        state.set_review(CreativeReview {
            score,
            feedback: "feedback".to_string(),
        });
        state
    }

    fn snapshot(iteration: u32, passed: bool, score: f64) -> IterationSnapshot {
        let violations = if passed {
            Vec::new()
        } else {
            vec![violation(Rule::BannedPhrase)]
        };
        IterationSnapshot {
            iteration,
            template_id: Some("linkedin.scroll-stopper".to_string()),
            draft: format!("draft-{iteration}"),
            compliance: report(violations),
            review: CreativeReview {
                score,
                feedback: String::new(),
            },
            transition: Transition::Revise(ReviseTarget::Write),
        }
    }

    #[test]
    fn publishes_when_both_bars_met() {
        let state = reviewed_state(report(Vec::new()), 8.5, 0);
        assert_eq!(decide(&state), Transition::Publish);
    }

    #[test]
    fn compliance_failure_blocks_publish_even_with_high_score() {
        let state = reviewed_state(report(vec![violation(Rule::BannedPhrase)]), 9.8, 0);
        assert_eq!(decide(&state), Transition::Revise(ReviseTarget::Write));
    }

    #[test]
    fn low_score_revises_writer() {
        let state = reviewed_state(report(Vec::new()), 6.0, 1);
        assert_eq!(decide(&state), Transition::Revise(ReviseTarget::Write));
    }

    #[test]
    fn structural_failure_revises_router() {
        let state = reviewed_state(report(vec![violation(Rule::MissingMarker)]), 9.0, 0);
        assert_eq!(decide(&state), Transition::Revise(ReviseTarget::Route));
    }

    #[test]
    fn content_failure_alongside_structural_still_routes() {
        let state = reviewed_state(
            report(vec![
                violation(Rule::ReadabilityGrade),
                violation(Rule::SegmentLength),
            ]),
            4.0,
            0,
        );
        assert_eq!(decide(&state), Transition::Revise(ReviseTarget::Route));
    }

    #[test]
    fn aborts_when_budget_spent() {
        let state = reviewed_state(report(vec![violation(Rule::MissingMarker)]), 5.0, 3);
        assert_eq!(
            decide(&state),
            Transition::Abort(AbortReason::MaxIterationsExhausted)
        );
    }

    #[test]
    fn publish_wins_over_exhausted_budget() {
        let state = reviewed_state(report(Vec::new()), 9.0, 3);
        assert_eq!(decide(&state), Transition::Publish);
    }

    #[test]
    fn missing_review_is_a_missed_bar() {
        let mut state = SharedState::new(RunConfig::new(
            "topic",
            Platform::Blog,
            PersonaSelector::registered("jobs"),
        ));
        state.set_draft("draft".to_string());
        state.set_compliance(report(Vec::new()));
        assert!(!meets_quality_bar(&state));
    }

    #[test]
    fn best_prefers_compliant_drafts() {
        let history = vec![
            snapshot(0, false, 9.5),
            snapshot(1, true, 6.0),
            snapshot(2, true, 7.5),
        ];
        assert_eq!(select_best(&history).expect("best").iteration, 2);
    }

    #[test]
    fn best_falls_back_to_overall_score() {
        let history = vec![
            snapshot(0, false, 4.0),
            snapshot(1, false, 7.0),
            snapshot(2, false, 6.0),
        ];
        assert_eq!(select_best(&history).expect("best").iteration, 1);
    }

    #[test]
    fn best_ties_go_to_earliest() {
        let history = vec![
            snapshot(0, true, 5.0),
            snapshot(1, true, 5.0),
            snapshot(2, true, 5.0),
        ];
        assert_eq!(select_best(&history).expect("best").iteration, 0);
    }

    #[test]
    fn best_of_empty_history_is_none() {
        assert!(select_best(&[]).is_none());
    }
}
