//! Stable exit codes for `nexus` CLI commands.

use crate::core::types::TerminalReason;

/// Command succeeded; for `nexus run`, the draft was published.
pub const OK: i32 = 0;
/// Invalid arguments, config or other errors before a run could start.
pub const INVALID: i32 = 1;
/// The iteration budget ran out; the best draft was still returned.
pub const EXHAUSTED: i32 = 2;
/// The run failed.
pub const FAILED: i32 = 3;

pub fn for_reason(reason: TerminalReason) -> i32 {
    match reason {
        TerminalReason::Published => OK,
        TerminalReason::MaxIterationsExhausted => EXHAUSTED,
        TerminalReason::Failed => FAILED,
    }
}
