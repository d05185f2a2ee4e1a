//! Review: creative score and feedback from the evaluation collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::core::compliance::MetricError;
use crate::core::metrics::PhraseMatcher;
use crate::core::state::SharedState;
use crate::core::types::{CreativeReview, StageName};
use crate::io::collaborator::{CollaboratorError, Evaluation, EvaluationRequest, Evaluator};
use crate::io::retry::{CallError, call_with_retry};

use super::{Stage, StageContext, StageError};

pub struct ReviewStage {
    evaluator: Arc<dyn Evaluator>,
    banned: Arc<PhraseMatcher>,
}

impl ReviewStage {
    pub fn new(evaluator: Arc<dyn Evaluator>, banned: Arc<PhraseMatcher>) -> Self {
        Self { evaluator, banned }
    }
}

#[async_trait]
impl Stage for ReviewStage {
    fn name(&self) -> StageName {
        StageName::Review
    }

    #[instrument(name = "review", skip_all, fields(iteration = state.iteration_count()))]
    async fn execute(
        &self,
        state: &SharedState,
        ctx: &StageContext,
    ) -> Result<SharedState, StageError> {
        let config = state.config();
        let draft = state.draft().ok_or(MetricError::EmptyDraft)?;
        let persona = state
            .persona()
            .ok_or_else(|| StageError::ContractViolation("persona was not resolved".to_string()))?;

        let request = EvaluationRequest {
            draft: draft.to_string(),
            persona: persona.clone(),
            platform: config.platform,
            topic: config.topic.clone(),
            iteration: state.iteration_count(),
            banned_hits: self
                .banned
                .find(draft)
                .into_iter()
                .map(|hit| hit.phrase)
                .collect(),
        };
        let evaluator = &self.evaluator;
        let request = &request;
        let evaluation = match call_with_retry(&ctx.policy, &ctx.cancel, "review", move || {
            evaluator.evaluate(request)
        })
        .await
        {
            Ok(evaluation) => evaluation,
            // The judge kept answering without a usable score: keep the pass
            // with the lowest score and its reply as feedback.
            Err(CallError::Failed(CollaboratorError {
                reply: Some(reply),
                message,
                ..
            })) => {
                warn!(error = %message, "unscored review, falling back to 0");
                Evaluation {
                    score: 0.0,
                    feedback: reply,
                }
            }
            Err(err) => return Err(StageError::generation(err)),
        };

        if !evaluation.score.is_finite() {
            return Err(StageError::Generation(format!(
                "evaluator returned a non-finite score ({})",
                evaluation.score
            )));
        }
        let score = evaluation.score.clamp(0.0, 10.0);
        info!(score, "draft reviewed");

        let mut next = state.clone();
        next.set_review(CreativeReview {
            score,
            feedback: evaluation.feedback.trim().to_string(),
        });
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PersonaSelector, Platform, RunConfig};
    use crate::registry::PersonaRegistry;
    use crate::test_support::{ScriptedEvaluator, fast_policy};
    use tokio_util::sync::CancellationToken;

    fn drafted(draft: &str) -> SharedState {
        let config = RunConfig::new("remote work", Platform::Linkedin, PersonaSelector::registered("musk"));
        let persona = PersonaRegistry::builtin()
            .resolve(&config.persona)
            .expect("persona");
        let mut state = SharedState::new(config);
        state.set_persona(persona);
        state.set_draft(draft.to_string());
        state
    }

    fn stage(evaluator: Arc<ScriptedEvaluator>) -> ReviewStage {
        ReviewStage::new(
            evaluator,
            Arc::new(PhraseMatcher::new(["synergy", "leverage"]).expect("matcher")),
        )
    }

    fn ctx() -> StageContext {
        StageContext {
            cancel: CancellationToken::new(),
            policy: fast_policy(),
        }
    }

    #[tokio::test]
    async fn passes_banned_hits_and_clamps_score() {
        let evaluator = Arc::new(ScriptedEvaluator::scores([(12.0, " Strong. ")]));
        let next = stage(evaluator.clone())
            .execute(&drafted("Leverage this now."), &ctx())
            .await
            .expect("review");
        assert_eq!(
            next.review(),
            Some(&CreativeReview {
                score: 10.0,
                feedback: "Strong.".to_string(),
            })
        );

        let requests = evaluator.requests();
        assert_eq!(requests[0].banned_hits, vec!["leverage".to_string()]);
        assert_eq!(requests[0].persona.id, "musk");
        assert_eq!(requests[0].iteration, 0);
    }

    #[tokio::test]
    async fn non_finite_score_fails_without_retry() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![Ok(Evaluation {
            score: f64::NAN,
            feedback: String::new(),
        })]));
        let err = stage(evaluator.clone())
            .execute(&drafted("Fine draft."), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Generation(ref message) if message.contains("non-finite")));
        assert_eq!(evaluator.call_count(), 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![
            Err(CollaboratorError::transient("rate limited")),
            Ok(Evaluation {
                score: 7.0,
                feedback: "ok".to_string(),
            }),
        ]));
        let next = stage(evaluator.clone())
            .execute(&drafted("Fine draft."), &ctx())
            .await
            .expect("review");
        assert_eq!(next.review().map(|review| review.score), Some(7.0));
        assert_eq!(evaluator.call_count(), 2);
    }

    #[tokio::test]
    async fn unscored_reply_is_retried_then_scored_zero() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![
            Err(CollaboratorError::unparseable("no score", "Solid but flat.")),
            Err(CollaboratorError::unparseable("no score", "Solid but flat.")),
            Err(CollaboratorError::unparseable("no score", "Still flat.")),
        ]));
        let next = stage(evaluator.clone())
            .execute(&drafted("Fine draft."), &ctx())
            .await
            .expect("review");
        assert_eq!(
            next.review(),
            Some(&CreativeReview {
                score: 0.0,
                feedback: "Still flat.".to_string(),
            })
        );
        assert_eq!(evaluator.call_count(), 3);
    }

    #[tokio::test]
    async fn unscored_reply_recovers_on_retry() {
        let evaluator = Arc::new(ScriptedEvaluator::new(vec![
            Err(CollaboratorError::unparseable("no score", "hmm")),
            Ok(Evaluation {
                score: 8.0,
                feedback: "Good.".to_string(),
            }),
        ]));
        let next = stage(evaluator.clone())
            .execute(&drafted("Fine draft."), &ctx())
            .await
            .expect("review");
        assert_eq!(next.review().map(|review| review.score), Some(8.0));
    }
}
