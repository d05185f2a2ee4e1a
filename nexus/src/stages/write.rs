//! Write: generate a draft from facts, template and persona.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::core::assemble::normalize_draft;
use crate::core::feedback::revision_feedback;
use crate::core::state::SharedState;
use crate::core::types::StageName;
use crate::io::collaborator::{CollaboratorError, GenerationRequest, GenerationRole, Generator};
use crate::io::prompt::{PromptBuilder, WriterPromptInput};
use crate::io::retry::call_with_retry;

use super::{Stage, StageContext, StageError};

pub struct WriteStage {
    generator: Arc<dyn Generator>,
    prompts: PromptBuilder,
    banned_phrases: Vec<String>,
}

impl WriteStage {
    pub fn new(
        generator: Arc<dyn Generator>,
        prompts: PromptBuilder,
        banned_phrases: Vec<String>,
    ) -> Self {
        Self {
            generator,
            prompts,
            banned_phrases,
        }
    }
}

#[async_trait]
impl Stage for WriteStage {
    fn name(&self) -> StageName {
        StageName::Write
    }

    #[instrument(name = "write", skip_all, fields(iteration = state.iteration_count()))]
    async fn execute(
        &self,
        state: &SharedState,
        ctx: &StageContext,
    ) -> Result<SharedState, StageError> {
        let config = state.config();
        let persona = state
            .persona()
            .ok_or_else(|| StageError::ContractViolation("persona was not resolved".to_string()))?;
        let template = state
            .template()
            .ok_or_else(|| StageError::ContractViolation("no template was routed".to_string()))?;

        let previous = state.latest_snapshot();
        let feedback =
            previous.map(|snapshot| revision_feedback(snapshot, config.thresholds.creative_threshold));
        let prompt = self
            .prompts
            .build_writer(&WriterPromptInput {
                topic: &config.topic,
                platform: config.platform,
                persona,
                template,
                facts: state.facts(),
                intent: state.intent(),
                previous_draft: previous.map(|snapshot| snapshot.draft.as_str()),
                feedback: feedback.as_deref(),
                banned_phrases: &self.banned_phrases,
            })
            .map_err(|err| StageError::Generation(format!("render writer prompt: {err}")))?;
        debug!(bytes = prompt.len(), revision = previous.is_some(), "writer prompt built");

        let request = GenerationRequest {
            role: GenerationRole::Writer,
            system: persona.voice.clone(),
            prompt,
            json_response: false,
        };
        let generator = &self.generator;
        let request = &request;
        let platform = config.platform;
        let draft = call_with_retry(&ctx.policy, &ctx.cancel, "write", move || async move {
            let raw = generator.generate(request).await?;
            let draft = normalize_draft(&raw, platform);
            if draft.is_empty() {
                return Err(CollaboratorError::transient("generator returned an empty draft"));
            }
            Ok(draft)
        })
        .await
        .map_err(StageError::generation)?;
        info!(chars = draft.chars().count(), template = %template.id, "draft written");

        let mut next = state.clone();
        next.set_draft(draft);
        Ok(next)
    }
}
