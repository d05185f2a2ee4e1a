//! Bounded research → write → review content workflow.
//!
//! A run threads one [`core::state::SharedState`] through five stages
//! (research, route, write, optimize, review), then a pure decision policy
//! either publishes the draft, loops back to write or route, or stops once the
//! iteration budget is spent and returns the best draft seen. The architecture
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (state, decision policy, text
//!   metrics, compliance). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (search and chat APIs, retries,
//!   config, reports). Behind traits so tests can script them.
//! - **[`registry`]**: Static platform templates and personas.
//!
//! [`stages`] adapts core logic and collaborators into the pipeline steps and
//! [`engine`] drives them as an explicit state machine.

pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod registry;
pub mod stages;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
