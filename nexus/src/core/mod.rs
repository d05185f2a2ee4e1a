//! Deterministic, pure logic shared by the workflow engine and stages.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod assemble;
pub mod compliance;
pub mod decision;
pub mod feedback;
pub mod intent;
pub mod invariants;
pub mod metrics;
pub mod research_plan;
pub mod state;
pub mod types;
