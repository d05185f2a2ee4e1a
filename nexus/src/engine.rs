//! The workflow state machine.
//!
//! One run executes research, route, write, optimize and review in order,
//! then asks the decision policy what to do next. A revision jumps back to
//! write or route with the iteration count bumped; publish and abort end the
//! run. Any stage error ends the run as `Failed`.
//!
//! The engine holds no per-run state, so a single instance can drive any
//! number of concurrent runs.

use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::assemble::polish_for_publish;
use crate::core::decision::{decide, select_best};
use crate::core::invariants::validate_invariants;
use crate::core::state::SharedState;
use crate::core::types::{PersonaSelector, RunConfig, StageName, TerminalReason, Transition};
use crate::io::config::{MAX_ITERATIONS_CEILING, NexusConfig};
use crate::io::retry::CallPolicy;
use crate::registry::{PersonaRegistry, TemplateRegistry};
use crate::stages::{Collaborators, ErrorKind, StageContext, StageError, StageRegistry};

/// Minimum number of non-whitespace characters in a topic.
pub const MIN_TOPIC_CHARS: usize = 3;

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: ErrorKind,
    /// Stage that raised the error; `None` for validation failures.
    pub stage: Option<StageName>,
    pub message: String,
}

impl RunError {
    fn invalid_config(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidConfig,
            stage: None,
            message: message.into(),
        }
    }

    fn contract(stage: Option<StageName>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ContractViolation,
            stage,
            message: message.into(),
        }
    }

    fn from_stage(stage: StageName, err: &StageError) -> Self {
        Self {
            kind: err.kind(),
            stage: Some(stage),
            message: err.to_string(),
        }
    }
}

/// Progress notifications emitted while a run executes.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    StageStarted { stage: StageName, iteration: u32 },
    StageCompleted { stage: StageName, iteration: u32 },
    Decided { iteration: u32, transition: Transition },
    Finished { reason: TerminalReason },
}

/// Final outcome of one run.
///
/// `error` is set exactly when the run failed; a successful or degraded run
/// carries its output in `terminal_output`.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    run_id: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    terminal_reason: TerminalReason,
    terminal_output: Option<String>,
    error: Option<RunError>,
    state: SharedState,
}

impl RunResult {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn terminal_reason(&self) -> TerminalReason {
        self.terminal_reason
    }

    pub fn terminal_output(&self) -> Option<&str> {
        self.terminal_output.as_deref()
    }

    pub fn error(&self) -> Option<&RunError> {
        self.error.as_ref()
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn into_state(self) -> SharedState {
        self.state
    }
}

pub struct WorkflowEngine {
    stages: StageRegistry,
    personas: PersonaRegistry,
    policy: CallPolicy,
}

impl WorkflowEngine {
    /// Fails when any pipeline stage has no registered implementation.
    pub fn new(stages: StageRegistry, personas: PersonaRegistry, policy: CallPolicy) -> Result<Self> {
        let missing = stages.missing();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|name| name.as_str()).collect();
            bail!("stage registry is missing: {}", names.join(", "));
        }
        Ok(Self {
            stages,
            personas,
            policy,
        })
    }

    /// Standard stages, built-in registries plus config templates.
    pub fn from_config(cfg: &NexusConfig, collaborators: &Collaborators) -> Result<Self> {
        let templates = template_registry(cfg)?;
        let stages = StageRegistry::standard(collaborators, cfg, Arc::new(templates))?;
        Self::new(stages, PersonaRegistry::builtin(), cfg.call_policy())
    }

    pub async fn run(&self, config: RunConfig, cancel: &CancellationToken) -> RunResult {
        self.run_with_observer(config, cancel, |_| {}).await
    }

    /// Execute one run, reporting progress to `observer`.
    pub async fn run_with_observer<F>(
        &self,
        config: RunConfig,
        cancel: &CancellationToken,
        mut observer: F,
    ) -> RunResult
    where
        F: FnMut(&RunEvent),
    {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            platform = %config.platform,
            max_iterations = config.max_iterations,
            "run started"
        );

        let mut state = SharedState::new(config);
        let error = match self.drive(&mut state, cancel, &mut observer).await {
            Ok(()) => None,
            Err(err) => {
                warn!(
                    run_id = %run_id,
                    kind = ?err.kind,
                    stage = ?err.stage,
                    "run failed: {}",
                    err.message
                );
                state.finish(TerminalReason::Failed, None);
                Some(err)
            }
        };
        for violation in validate_invariants(&state) {
            warn!(run_id = %run_id, "state invariant violated: {violation}");
        }
        let terminal_reason = state.terminal_reason().unwrap_or(TerminalReason::Failed);
        observer(&RunEvent::Finished {
            reason: terminal_reason,
        });
        info!(
            run_id = %run_id,
            reason = ?terminal_reason,
            passes = state.history().len(),
            "run finished"
        );

        RunResult {
            run_id,
            started_at,
            finished_at: Utc::now(),
            terminal_reason,
            terminal_output: state.terminal_output().map(str::to_string),
            error,
            state,
        }
    }

    async fn drive<F>(
        &self,
        state: &mut SharedState,
        cancel: &CancellationToken,
        observer: &mut F,
    ) -> Result<(), RunError>
    where
        F: FnMut(&RunEvent),
    {
        self.validate(state.config()).map_err(RunError::invalid_config)?;
        let persona = self
            .personas
            .resolve(&state.config().persona)
            .map_err(RunError::invalid_config)?;
        state.set_persona(persona);

        let ctx = StageContext {
            cancel: cancel.clone(),
            policy: self.policy,
        };
        let mut entry = StageName::Research;
        loop {
            let iteration = state.iteration_count();
            for name in StageName::ALL.into_iter().skip_while(|name| *name != entry) {
                if cancel.is_cancelled() {
                    return Err(RunError::from_stage(name, &StageError::Cancelled));
                }
                let stage = self.stages.get(name).ok_or_else(|| {
                    RunError::contract(Some(name), format!("no stage registered for {name}"))
                })?;
                observer(&RunEvent::StageStarted {
                    stage: name,
                    iteration,
                });
                debug!(stage = %name, iteration, "stage started");

                let next = stage
                    .execute(state, &ctx)
                    .await
                    .map_err(|err| RunError::from_stage(name, &err))?;
                if !state.control_matches(&next) {
                    return Err(RunError::from_stage(
                        name,
                        &StageError::ContractViolation(
                            "stage returned state from a different run".to_string(),
                        ),
                    ));
                }
                *state = next;
                observer(&RunEvent::StageCompleted {
                    stage: name,
                    iteration,
                });
            }

            let transition = decide(state);
            info!(iteration, transition = ?transition, "decision");
            observer(&RunEvent::Decided {
                iteration,
                transition,
            });
            state
                .record_pass(transition)
                .map_err(|message| RunError::contract(None, message))?;

            match transition {
                Transition::Publish => {
                    let platform = state.config().platform;
                    let output = state.draft().map(|draft| polish_for_publish(draft, platform));
                    state.finish(TerminalReason::Published, output);
                    return Ok(());
                }
                Transition::Abort(_) => {
                    let best = select_best(state.history()).map(|snapshot| snapshot.draft.clone());
                    state.finish(TerminalReason::MaxIterationsExhausted, best);
                    return Ok(());
                }
                Transition::Revise(target) => {
                    state
                        .begin_revision()
                        .map_err(|message| RunError::contract(None, message))?;
                    entry = target.stage();
                }
            }
        }
    }

    fn validate(&self, config: &RunConfig) -> Result<(), String> {
        let topic_chars = config.topic.chars().filter(|c| !c.is_whitespace()).count();
        if topic_chars < MIN_TOPIC_CHARS {
            return Err(format!(
                "topic must contain at least {MIN_TOPIC_CHARS} non-space characters"
            ));
        }
        if config.max_iterations > MAX_ITERATIONS_CEILING {
            return Err(format!(
                "max_iterations must be <= {MAX_ITERATIONS_CEILING} (got {})",
                config.max_iterations
            ));
        }
        let threshold = config.thresholds.creative_threshold;
        if !(0.0..=10.0).contains(&threshold) {
            return Err(format!("creative_threshold must be within 0..=10 (got {threshold})"));
        }
        if let PersonaSelector::Custom { voice, .. } = &config.persona {
            if voice.trim().is_empty() {
                return Err("custom persona requires a voice instruction".to_string());
            }
        }
        Ok(())
    }
}

/// Built-in templates followed by the config's `[[templates]]` entries.
pub fn template_registry(cfg: &NexusConfig) -> Result<TemplateRegistry> {
    let mut templates = TemplateRegistry::builtin();
    for template in &cfg.templates {
        templates
            .register(template.clone())
            .map_err(anyhow::Error::msg)?;
    }
    Ok(templates)
}
