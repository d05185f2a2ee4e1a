//! Research: classify the topic's intent and keyword, then fan it out into
//! sub-queries and merge the facts.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::core::intent::ContentIntent;
use crate::core::research_plan::{merge_facts, plan_queries};
use crate::core::state::SharedState;
use crate::core::types::{Fact, StageName};
use crate::io::collaborator::{FactRetriever, IntentAnalyzer};
use crate::io::config::ResearchConfig;
use crate::io::retry::{CallError, call_with_retry};

use super::{Stage, StageContext, StageError};

pub struct ResearchStage {
    retriever: Arc<dyn FactRetriever>,
    analyzer: Option<Arc<dyn IntentAnalyzer>>,
    settings: ResearchConfig,
}

impl ResearchStage {
    pub fn new(retriever: Arc<dyn FactRetriever>, settings: ResearchConfig) -> Self {
        Self {
            retriever,
            analyzer: None,
            settings,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn IntentAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Analyzed intent, or the longest-topic-word fallback when the analyzer
    /// is absent or fails.
    async fn intent(
        &self,
        state: &SharedState,
        ctx: &StageContext,
    ) -> Result<ContentIntent, StageError> {
        let config = state.config();
        let Some(analyzer) = &self.analyzer else {
            return Ok(ContentIntent::fallback(&config.topic));
        };
        let (topic, platform) = (config.topic.as_str(), config.platform);
        match call_with_retry(&ctx.policy, &ctx.cancel, "intent", move || {
            analyzer.analyze(topic, platform)
        })
        .await
        {
            Ok(intent) => Ok(intent),
            Err(CallError::Cancelled) => Err(StageError::Cancelled),
            Err(err) => {
                warn!(error = %err, "intent analysis failed, using topic keyword");
                Ok(ContentIntent::fallback(topic))
            }
        }
    }

    async fn search(&self, query: &str, ctx: &StageContext) -> Result<Vec<Fact>, CallError> {
        let retriever = &self.retriever;
        let max_results = self.settings.results_per_query;
        call_with_retry(&ctx.policy, &ctx.cancel, "research", move || {
            retriever.search(query, max_results)
        })
        .await
    }
}

#[async_trait]
impl Stage for ResearchStage {
    fn name(&self) -> StageName {
        StageName::Research
    }

    #[instrument(name = "research", skip_all)]
    async fn execute(
        &self,
        state: &SharedState,
        ctx: &StageContext,
    ) -> Result<SharedState, StageError> {
        let intent = self.intent(state, ctx).await?;
        let queries = plan_queries(&state.config().topic, self.settings.max_queries);

        // join_all yields results in input order, so completion order never
        // leaks into the fact list.
        let results = if self.settings.parallel {
            join_all(queries.iter().map(|query| self.search(query, ctx))).await
        } else {
            let mut results = Vec::with_capacity(queries.len());
            for query in &queries {
                results.push(self.search(query, ctx).await);
            }
            results
        };

        let mut answered = Vec::new();
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(facts) => answered.push(facts),
                Err(CallError::Cancelled) => return Err(StageError::Cancelled),
                Err(err) => warn!(query = %query, error = %err, "research query failed"),
            }
        }
        if answered.is_empty() {
            return Err(StageError::Retrieval(format!(
                "retrieval service unreachable: all {} queries failed",
                queries.len()
            )));
        }

        let facts = merge_facts(answered, self.settings.max_facts);
        if facts.is_empty() {
            return Err(StageError::Retrieval("no usable facts found".to_string()));
        }
        info!(
            queries = queries.len(),
            facts = facts.len(),
            intent = %intent.primary_intent,
            keyword = %intent.primary_keyword,
            "research complete"
        );

        let mut next = state.clone();
        next.set_intent(intent);
        next.set_facts(facts);
        Ok(next)
    }
}
