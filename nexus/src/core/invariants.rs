//! Run-state invariants that the type system does not enforce on its own.

use crate::core::assemble::polish_for_publish;
use crate::core::state::SharedState;
use crate::core::types::{TerminalReason, Transition};

/// Check run-state invariants:
/// - `iteration_count <= max_iterations`
/// - history entries are numbered `0..len` and each iteration appears once
/// - history holds one snapshot per counted pass (`iteration_count + 1` once a
///   decision has been taken for the current pass)
/// - only the last snapshot may carry a terminal transition
/// - `terminal_output` is set iff the run ended with a usable draft, and a
///   published one is the final draft after publish polish
pub fn validate_invariants(state: &SharedState) -> Vec<String> {
    let mut errors = Vec::new();
    let max = state.config().max_iterations;
    let count = state.iteration_count();

    if count > max {
        errors.push(format!(
            "iteration_count {count} exceeds max_iterations {max}"
        ));
    }

    let history = state.history();
    for (index, snapshot) in history.iter().enumerate() {
        if snapshot.iteration as usize != index {
            errors.push(format!(
                "history[{index}]: iteration {} out of sequence",
                snapshot.iteration
            ));
        }
        let is_last = index + 1 == history.len();
        if !is_last && !matches!(snapshot.transition, Transition::Revise(_)) {
            errors.push(format!(
                "history[{index}]: terminal transition before the final pass"
            ));
        }
    }

    let expected = [count as usize, count as usize + 1];
    if !history.is_empty() && !expected.contains(&history.len()) {
        errors.push(format!(
            "history has {} entries for iteration_count {count}",
            history.len()
        ));
    }

    match (state.terminal_reason(), state.terminal_output()) {
        (Some(TerminalReason::Published | TerminalReason::MaxIterationsExhausted), None) => {
            errors.push("finished run with a draft outcome has no terminal_output".to_string());
        }
        (Some(TerminalReason::Published | TerminalReason::MaxIterationsExhausted), Some(""))
        | (Some(TerminalReason::Failed) | None, Some(_)) => {
            errors.push("terminal_output does not match terminal_reason".to_string());
        }
        _ => {}
    }

    if state.terminal_reason() == Some(TerminalReason::Published) {
        match state.latest_snapshot() {
            Some(last) if last.transition == Transition::Publish => {
                let published = polish_for_publish(&last.draft, state.config().platform);
                if Some(published.as_str()) != state.terminal_output() {
                    errors.push("published output differs from the final draft".to_string());
                }
            }
            _ => errors.push("published run does not end with a Publish decision".to_string()),
        }
    }

    errors
}
