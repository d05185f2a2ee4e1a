//! Optimize: deterministic compliance checks on the current draft.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::core::compliance::{ComplianceInput, MetricError, evaluate};
use crate::core::metrics::{self, PhraseMatcher};
use crate::core::state::SharedState;
use crate::core::types::StageName;

use super::{Stage, StageContext, StageError};

pub struct OptimizeStage {
    banned: Arc<PhraseMatcher>,
}

impl OptimizeStage {
    pub fn new(banned: Arc<PhraseMatcher>) -> Self {
        Self { banned }
    }
}

#[async_trait]
impl Stage for OptimizeStage {
    fn name(&self) -> StageName {
        StageName::Optimize
    }

    async fn execute(
        &self,
        state: &SharedState,
        _ctx: &StageContext,
    ) -> Result<SharedState, StageError> {
        let config = state.config();
        let draft = state.draft().ok_or(MetricError::EmptyDraft)?;
        let topic_keyword = metrics::primary_keyword(&config.topic);
        let keyword = state
            .intent()
            .map(|intent| intent.primary_keyword.as_str())
            .filter(|keyword| !keyword.trim().is_empty())
            .or(topic_keyword.as_deref());
        let report = evaluate(&ComplianceInput {
            draft,
            keyword,
            facts: state.facts(),
            template: state.template(),
            max_readability_grade: config.thresholds.max_readability_grade,
            banned: &self.banned,
        })?;
        info!(
            passed = report.passed,
            errors = report.errors().count(),
            violations = report.violations.len(),
            grade = report.metrics.readability_grade,
            "compliance checked"
        );

        let mut next = state.clone();
        next.set_compliance(report);
        Ok(next)
    }
}
