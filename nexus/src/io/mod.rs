//! Side-effecting collaborators: network backends, retries, prompts,
//! configuration and run reports.

pub mod chat;
pub mod collaborator;
pub mod config;
pub mod prompt;
pub mod report;
pub mod retry;
pub mod tavily;
