//! Test-only scripted collaborators and fixtures.
//!
//! Collaborators replay a fixed script and record every request so tests can
//! assert on call counts and prompt contents without any network.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::intent::ContentIntent;
use crate::core::types::{Fact, Platform, TemplateRules, TemplateSpec};
use crate::io::collaborator::{
    CollaboratorError, Evaluation, EvaluationRequest, Evaluator, FactRetriever, GenerationRequest,
    Generator, IntentAnalyzer,
};
use crate::io::retry::CallPolicy;

/// One scripted collaborator response.
#[derive(Debug, Clone)]
pub enum Step<T> {
    Reply(Result<T, CollaboratorError>),
    /// Never answer; exercises timeouts and cancellation.
    Hang,
}

struct Script<T> {
    steps: Mutex<VecDeque<Step<T>>>,
}

impl<T> Script<T> {
    fn new(steps: impl IntoIterator<Item = Step<T>>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
        }
    }

    async fn next(&self, what: &str) -> Result<T, CollaboratorError> {
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(result)) => result,
            Some(Step::Hang) => std::future::pending().await,
            None => Err(CollaboratorError::permanent(format!("{what} script exhausted"))),
        }
    }
}

/// Retriever that answers per query, falling back to one default answer.
pub struct ScriptedRetriever {
    fallback: Result<Vec<Fact>, CollaboratorError>,
    by_query: HashMap<String, Result<Vec<Fact>, CollaboratorError>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRetriever {
    pub fn returning(facts: Vec<Fact>) -> Self {
        Self {
            fallback: Ok(facts),
            by_query: HashMap::new(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: CollaboratorError) -> Self {
        Self {
            fallback: Err(err),
            ..Self::returning(Vec::new())
        }
    }

    pub fn with_query(
        mut self,
        query: &str,
        result: Result<Vec<Fact>, CollaboratorError>,
    ) -> Self {
        self.by_query.insert(query.to_string(), result);
        self
    }

    pub fn with_delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    /// Queries received, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FactRetriever for ScriptedRetriever {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Fact>, CollaboratorError> {
        self.calls.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        let mut facts = self.by_query.get(query).unwrap_or(&self.fallback).clone()?;
        facts.truncate(max_results);
        Ok(facts)
    }
}

/// Generator that replays a script of drafts and failures.
pub struct ScriptedGenerator {
    script: Script<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, CollaboratorError>>) -> Self {
        Self::with_steps(replies.into_iter().map(Step::Reply))
    }

    pub fn with_steps(steps: impl IntoIterator<Item = Step<String>>) -> Self {
        Self {
            script: Script::new(steps),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Successful drafts, one per call.
    pub fn drafts<I, S>(drafts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(drafts.into_iter().map(|draft| Ok(draft.into())).collect())
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script.next("generator").await
    }
}

/// Evaluator that replays a script of verdicts and failures.
pub struct ScriptedEvaluator {
    script: Script<Evaluation>,
    requests: Mutex<Vec<EvaluationRequest>>,
}

impl ScriptedEvaluator {
    pub fn new(replies: Vec<Result<Evaluation, CollaboratorError>>) -> Self {
        Self::with_steps(replies.into_iter().map(Step::Reply))
    }

    pub fn with_steps(steps: impl IntoIterator<Item = Step<Evaluation>>) -> Self {
        Self {
            script: Script::new(steps),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Successful verdicts, one per call.
    pub fn scores<'a>(verdicts: impl IntoIterator<Item = (f64, &'a str)>) -> Self {
        Self::new(
            verdicts
                .into_iter()
                .map(|(score, feedback)| {
                    Ok(Evaluation {
                        score,
                        feedback: feedback.to_string(),
                    })
                })
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<EvaluationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<Evaluation, CollaboratorError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script.next("evaluator").await
    }
}

/// Analyzer that replays a script of intents and failures.
pub struct ScriptedAnalyzer {
    script: Script<ContentIntent>,
    topics: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    pub fn new(replies: Vec<Result<ContentIntent, CollaboratorError>>) -> Self {
        Self::with_steps(replies.into_iter().map(Step::Reply))
    }

    pub fn with_steps(steps: impl IntoIterator<Item = Step<ContentIntent>>) -> Self {
        Self {
            script: Script::new(steps),
            topics: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.topics.lock().unwrap().len()
    }
}

#[async_trait]
impl IntentAnalyzer for ScriptedAnalyzer {
    async fn analyze(
        &self,
        topic: &str,
        _platform: Platform,
    ) -> Result<ContentIntent, CollaboratorError> {
        self.topics.lock().unwrap().push(topic.to_string());
        self.script.next("analyzer").await
    }
}

/// Retry policy with millisecond backoff for tests.
pub fn fast_policy() -> CallPolicy {
    CallPolicy {
        max_retries: 2,
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        timeout: Duration::from_secs(5),
    }
}

/// Template with no formatting rules, so only banned phrases and
/// readability can fail a draft.
pub fn permissive_template(id: &str, platform: Platform) -> TemplateSpec {
    TemplateSpec {
        id: id.to_string(),
        name: format!("{id} template"),
        platform: Some(platform),
        structure: "Hook, body, call to action.".to_string(),
        examples: Vec::new(),
        rules: TemplateRules::default(),
    }
}
