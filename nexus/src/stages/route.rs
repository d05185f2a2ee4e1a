//! Route: pick the platform template the writer must follow.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::core::state::SharedState;
use crate::core::types::StageName;
use crate::registry::TemplateRegistry;

use super::{Stage, StageContext, StageError};

pub struct RouteStage {
    templates: Arc<TemplateRegistry>,
}

impl RouteStage {
    pub fn new(templates: Arc<TemplateRegistry>) -> Self {
        Self { templates }
    }
}

#[async_trait]
impl Stage for RouteStage {
    fn name(&self) -> StageName {
        StageName::Route
    }

    /// The first pass takes the platform's primary template. A re-route moves
    /// to the candidate after the current one, wrapping around.
    async fn execute(
        &self,
        state: &SharedState,
        _ctx: &StageContext,
    ) -> Result<SharedState, StageError> {
        let platform = state.config().platform;
        let candidates = self.templates.candidates(platform);
        let Some(first) = candidates.first() else {
            return Err(StageError::UnknownPlatform(platform));
        };

        let chosen = match state.template_ref() {
            Some(current) => candidates
                .iter()
                .position(|template| template.id == current)
                .map_or(*first, |index| candidates[(index + 1) % candidates.len()]),
            None => *first,
        };
        info!(
            platform = %platform,
            template = %chosen.id,
            reroute = state.template_ref().is_some(),
            "template routed"
        );

        let mut next = state.clone();
        next.set_template(chosen.clone());
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PersonaSelector, Platform, RunConfig};
    use crate::registry::templates::UNIVERSAL_ID;
    use crate::test_support::{fast_policy, permissive_template};
    use tokio_util::sync::CancellationToken;

    fn state(platform: Platform) -> SharedState {
        SharedState::new(RunConfig::new(
            "remote work",
            platform,
            PersonaSelector::registered("jobs"),
        ))
    }

    fn ctx() -> StageContext {
        StageContext {
            cancel: CancellationToken::new(),
            policy: fast_policy(),
        }
    }

    #[tokio::test]
    async fn first_pass_uses_primary_template() {
        let stage = RouteStage::new(Arc::new(TemplateRegistry::builtin()));
        let next = stage.execute(&state(Platform::Linkedin), &ctx()).await.expect("route");
        assert_eq!(next.template_ref(), Some("linkedin.scroll-stopper"));
    }

    #[tokio::test]
    async fn unregistered_platform_fails() {
        let stage = RouteStage::new(Arc::new(TemplateRegistry::builtin()));
        let err = stage.execute(&state(Platform::Youtube), &ctx()).await.unwrap_err();
        assert_eq!(err, StageError::UnknownPlatform(Platform::Youtube));
    }

    /// Verifies re-routing walks the candidate list and wraps around.
    #[tokio::test]
    async fn reroute_advances_and_wraps() {
        let mut registry = TemplateRegistry::empty();
        registry
            .register(permissive_template("blog.a", Platform::Blog))
            .expect("register a");
        registry
            .register(permissive_template("blog.b", Platform::Blog))
            .expect("register b");
        let stage = RouteStage::new(Arc::new(registry));

        let mut ids = Vec::new();
        let mut current = state(Platform::Blog);
        for _ in 0..4 {
            current = stage.execute(&current, &ctx()).await.expect("route");
            ids.push(current.template_ref().unwrap_or_default().to_string());
        }
        assert_eq!(ids, vec!["blog.a", "blog.b", UNIVERSAL_ID, "blog.a"]);
    }
}
