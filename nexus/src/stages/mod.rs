//! The `Stage` contract, the stage registry and the five pipeline stages.
//!
//! A stage reads the current [`SharedState`] and returns an updated copy. It
//! never sees engine-owned control fields as mutable, and the engine only
//! adopts the returned state when the stage succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::core::compliance::MetricError;
use crate::core::metrics::PhraseMatcher;
use crate::core::state::SharedState;
use crate::core::types::{Platform, StageName};
use crate::io::collaborator::{Evaluator, FactRetriever, Generator, IntentAnalyzer};
use crate::io::config::NexusConfig;
use crate::io::prompt::PromptBuilder;
use crate::io::retry::{CallError, CallPolicy};
use crate::registry::TemplateRegistry;

pub mod optimize;
pub mod research;
pub mod review;
pub mod route;
pub mod write;

pub use optimize::OptimizeStage;
pub use research::ResearchStage;
pub use review::ReviewStage;
pub use route::RouteStage;
pub use write::WriteStage;

/// Per-run context handed to every stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub cancel: CancellationToken,
    pub policy: CallPolicy,
}

/// Error kinds a run can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Retrieval,
    UnknownPlatform,
    Generation,
    InternalMetric,
    Cancelled,
    InvalidConfig,
    /// A stage or the engine broke the stage contract; a bug, not bad input.
    ContractViolation,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    #[error("fact retrieval failed: {0}")]
    Retrieval(String),
    #[error("no template registered for platform '{0}'")]
    UnknownPlatform(Platform),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("metric computation failed: {0}")]
    InternalMetric(#[from] MetricError),
    #[error("cancelled")]
    Cancelled,
    #[error("stage contract violated: {0}")]
    ContractViolation(String),
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Retrieval(_) => ErrorKind::Retrieval,
            StageError::UnknownPlatform(_) => ErrorKind::UnknownPlatform,
            StageError::Generation(_) => ErrorKind::Generation,
            StageError::InternalMetric(_) => ErrorKind::InternalMetric,
            StageError::Cancelled => ErrorKind::Cancelled,
            StageError::ContractViolation(_) => ErrorKind::ContractViolation,
        }
    }

    /// Map an exhausted or permanent generation call.
    pub(crate) fn generation(err: CallError) -> Self {
        match err {
            CallError::Cancelled => StageError::Cancelled,
            other => StageError::Generation(other.to_string()),
        }
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    /// Produce the next state from `state`. On error the engine discards any
    /// partial work and fails the run.
    async fn execute(
        &self,
        state: &SharedState,
        ctx: &StageContext,
    ) -> Result<SharedState, StageError>;
}

/// The external services stages call.
#[derive(Clone)]
pub struct Collaborators {
    pub retriever: Arc<dyn FactRetriever>,
    pub generator: Arc<dyn Generator>,
    pub evaluator: Arc<dyn Evaluator>,
    /// Topic intent and keyword; research falls back to the longest topic
    /// word when absent.
    pub analyzer: Option<Arc<dyn IntentAnalyzer>>,
}

/// Stages by name. Registering a name twice replaces the earlier stage.
#[derive(Clone, Default)]
pub struct StageRegistry {
    stages: BTreeMap<StageName, Arc<dyn Stage>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five built-in stages wired to `collaborators`.
    pub fn standard(
        collaborators: &Collaborators,
        cfg: &NexusConfig,
        templates: Arc<TemplateRegistry>,
    ) -> Result<Self> {
        let banned_phrases = cfg.banned_phrases();
        let banned = Arc::new(
            PhraseMatcher::new(&banned_phrases).context("compile banned phrase list")?,
        );
        let prompts = PromptBuilder::new(cfg.generation.prompt_budget_bytes)
            .context("load prompt templates")?;

        let mut registry = Self::new();
        let mut research =
            ResearchStage::new(collaborators.retriever.clone(), cfg.research.clone());
        if let Some(analyzer) = &collaborators.analyzer {
            research = research.with_analyzer(analyzer.clone());
        }
        registry.register(Arc::new(research));
        registry.register(Arc::new(RouteStage::new(templates)));
        registry.register(Arc::new(WriteStage::new(
            collaborators.generator.clone(),
            prompts,
            banned_phrases,
        )));
        registry.register(Arc::new(OptimizeStage::new(banned.clone())));
        registry.register(Arc::new(ReviewStage::new(
            collaborators.evaluator.clone(),
            banned,
        )));
        Ok(registry)
    }

    /// Add `stage` under its own name, returning the stage it replaced.
    pub fn register(&mut self, stage: Arc<dyn Stage>) -> Option<Arc<dyn Stage>> {
        self.stages.insert(stage.name(), stage)
    }

    pub fn get(&self, name: StageName) -> Option<&Arc<dyn Stage>> {
        self.stages.get(&name)
    }

    /// Pipeline stages with no registered implementation.
    pub fn missing(&self) -> Vec<StageName> {
        StageName::ALL
            .into_iter()
            .filter(|name| !self.stages.contains_key(name))
            .collect()
    }
}
