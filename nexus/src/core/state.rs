//! The single record threaded through every stage of a run.
//!
//! Stages receive `&SharedState` and hand back an updated copy; the engine
//! swaps it in only when the stage returns successfully, so a failed or
//! cancelled stage never leaves a half-applied update behind.
//!
//! Artifact fields (intent, facts, template, draft, compliance, review) have public
//! setters so replacement stages can produce them. Control fields (iteration
//! count, history, terminal outcome) are engine-owned and only mutable inside
//! the crate.

use serde::Serialize;

use crate::core::intent::ContentIntent;
use crate::core::types::{
    ComplianceReport, CreativeReview, Fact, IterationSnapshot, PersonaProfile, RunConfig,
    TemplateSpec, TerminalReason, Transition,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedState {
    config: RunConfig,
    persona: Option<PersonaProfile>,
    intent: Option<ContentIntent>,
    facts: Vec<Fact>,
    template: Option<TemplateSpec>,
    draft: Option<String>,
    compliance: Option<ComplianceReport>,
    review: Option<CreativeReview>,
    iteration_count: u32,
    history: Vec<IterationSnapshot>,
    terminal_output: Option<String>,
    terminal_reason: Option<TerminalReason>,
}

impl SharedState {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            persona: None,
            intent: None,
            facts: Vec::new(),
            template: None,
            draft: None,
            compliance: None,
            review: None,
            iteration_count: 0,
            history: Vec::new(),
            terminal_output: None,
            terminal_reason: None,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn persona(&self) -> Option<&PersonaProfile> {
        self.persona.as_ref()
    }

    /// Intent and keyword set by research.
    pub fn intent(&self) -> Option<&ContentIntent> {
        self.intent.as_ref()
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn template(&self) -> Option<&TemplateSpec> {
        self.template.as_ref()
    }

    /// Identifier of the routed template.
    pub fn template_ref(&self) -> Option<&str> {
        self.template.as_ref().map(|template| template.id.as_str())
    }

    pub fn draft(&self) -> Option<&str> {
        self.draft.as_deref()
    }

    pub fn compliance(&self) -> Option<&ComplianceReport> {
        self.compliance.as_ref()
    }

    pub fn review(&self) -> Option<&CreativeReview> {
        self.review.as_ref()
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn history(&self) -> &[IterationSnapshot] {
        &self.history
    }

    pub fn latest_snapshot(&self) -> Option<&IterationSnapshot> {
        self.history.last()
    }

    pub fn terminal_output(&self) -> Option<&str> {
        self.terminal_output.as_deref()
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        self.terminal_reason
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_reason.is_some()
    }

    /// True once the writer has run in a revision pass (history is non-empty).
    pub fn is_revision(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn set_intent(&mut self, intent: ContentIntent) {
        self.intent = Some(intent);
    }

    pub fn set_facts(&mut self, facts: Vec<Fact>) {
        self.facts = facts;
    }

    /// Append facts from an explicit re-research, skipping exact duplicates.
    pub fn extend_facts(&mut self, facts: impl IntoIterator<Item = Fact>) {
        for fact in facts {
            if !self.facts.contains(&fact) {
                self.facts.push(fact);
            }
        }
    }

    pub fn set_template(&mut self, template: TemplateSpec) {
        self.template = Some(template);
    }

    /// Replace the draft. Compliance and review describe the previous draft,
    /// so both are cleared and must be recomputed for this one.
    pub fn set_draft(&mut self, draft: String) {
        self.draft = Some(draft);
        self.compliance = None;
        self.review = None;
    }

    pub fn set_compliance(&mut self, report: ComplianceReport) {
        self.compliance = Some(report);
    }

    pub fn set_review(&mut self, review: CreativeReview) {
        self.review = Some(review);
    }

    pub(crate) fn set_persona(&mut self, persona: PersonaProfile) {
        self.persona = Some(persona);
    }

    /// True when `other` carries the same engine-owned fields as `self`.
    pub(crate) fn control_matches(&self, other: &SharedState) -> bool {
        self.config == other.config
            && self.iteration_count == other.iteration_count
            && self.history == other.history
            && self.terminal_reason == other.terminal_reason
            && self.terminal_output == other.terminal_output
    }

    /// Snapshot the completed pass into history.
    ///
    /// Fails when the pass did not produce a draft, compliance report and review.
    pub(crate) fn record_pass(&mut self, transition: Transition) -> Result<(), String> {
        let draft = self
            .draft
            .clone()
            .ok_or_else(|| "pass completed without a draft".to_string())?;
        let compliance = self
            .compliance
            .clone()
            .ok_or_else(|| "pass completed without a compliance report".to_string())?;
        let review = self
            .review
            .clone()
            .ok_or_else(|| "pass completed without a creative review".to_string())?;
        self.history.push(IterationSnapshot {
            iteration: self.iteration_count,
            template_id: self.template_ref().map(str::to_string),
            draft,
            compliance,
            review,
            transition,
        });
        Ok(())
    }

    /// Count one loop-back. Refuses to exceed `max_iterations`.
    pub(crate) fn begin_revision(&mut self) -> Result<(), String> {
        if self.iteration_count >= self.config.max_iterations {
            return Err(format!(
                "iteration budget exhausted ({}/{})",
                self.iteration_count, self.config.max_iterations
            ));
        }
        self.iteration_count += 1;
        Ok(())
    }

    /// Set the terminal outcome exactly once.
    pub(crate) fn finish(&mut self, reason: TerminalReason, output: Option<String>) {
        debug_assert!(self.terminal_reason.is_none(), "run finished twice");
        if self.terminal_reason.is_some() {
            return;
        }
        self.terminal_reason = Some(reason);
        self.terminal_output = output;
    }
}
