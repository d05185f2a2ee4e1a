//! Collaborator abstractions for the network-bound stages.
//!
//! The traits decouple stage logic from the actual backends (Tavily search and
//! an OpenAI-compatible chat API). Tests use scripted collaborators from
//! `test_support` that return predetermined outputs without any network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::intent::ContentIntent;
use crate::core::types::{Fact, PersonaProfile, Platform};

/// Failure reported by a collaborator.
///
/// `transient` failures (rate limits, 5xx, transport errors, empty or
/// unparseable output) are retried by the call policy; permanent ones fail the
/// call immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CollaboratorError {
    pub message: String,
    pub transient: bool,
    /// Raw reply that arrived but could not be interpreted.
    pub reply: Option<String>,
}

impl CollaboratorError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
            reply: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
            reply: None,
        }
    }

    /// Transient failure for a reply the caller could not parse.
    pub fn unparseable(message: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::transient(message)
        }
    }
}

/// Which stage a generation call serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationRole {
    Writer,
    Reviewer,
    Analyst,
}

/// Prompt context for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub role: GenerationRole,
    /// System instruction (persona voice for the writer, a rubric otherwise).
    pub system: String,
    pub prompt: String,
    /// Ask the backend for a JSON object response.
    pub json_response: bool,
}

/// Input to the evaluation collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub draft: String,
    pub persona: PersonaProfile,
    pub platform: Platform,
    pub topic: String,
    pub iteration: u32,
    /// Banned phrases found in the draft by the deterministic checks.
    pub banned_hits: Vec<String>,
}

/// Raw evaluator verdict, before range checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    pub feedback: String,
}

#[async_trait]
pub trait FactRetriever: Send + Sync {
    /// Search for fact snippets answering `query`.
    async fn search(&self, query: &str, max_results: usize)
    -> Result<Vec<Fact>, CollaboratorError>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait IntentAnalyzer: Send + Sync {
    /// Classify the intent of `topic` and pick its primary keyword.
    async fn analyze(
        &self,
        topic: &str,
        platform: Platform,
    ) -> Result<ContentIntent, CollaboratorError>;
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Score a draft 0-10 against persona and brand alignment.
    async fn evaluate(&self, request: &EvaluationRequest)
    -> Result<Evaluation, CollaboratorError>;
}

/// Classify an HTTP status: 429 and 5xx are worth retrying.
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(401));
    }

    #[test]
    fn error_constructors_set_transience() {
        assert!(CollaboratorError::transient("x").transient);
        let permanent = CollaboratorError::permanent("bad key");
        assert!(!permanent.transient);
        assert_eq!(permanent.to_string(), "bad key");

        let unparseable = CollaboratorError::unparseable("no score", "meh");
        assert!(unparseable.transient);
        assert_eq!(unparseable.reply.as_deref(), Some("meh"));
    }
}
