//! `nexus` command line: run the content workflow and manage its config.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use nexus::core::types::{PersonaSelector, Platform, RunConfig, TerminalReason};
use nexus::engine::{RunError, RunResult, WorkflowEngine, template_registry};
use nexus::exit_codes;
use nexus::io::chat::{ChatGenerator, LlmIntentAnalyzer, LlmJudge};
use nexus::io::collaborator::Generator;
use nexus::io::config::{CONFIG_FILE, NexusConfig, load_config, write_config};
use nexus::io::prompt::PromptBuilder;
use nexus::io::report::write_run_report;
use nexus::io::tavily::TavilyRetriever;
use nexus::logging;
use nexus::registry::PersonaRegistry;
use nexus::stages::Collaborators;

/// Persona used when neither `--persona` nor a custom voice is given.
const DEFAULT_PERSONA: &str = "stark";

#[derive(Parser)]
#[command(
    name = "nexus",
    version,
    about = "Research, write and review platform content until it clears the quality bar"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the workflow for one topic and print the resulting draft.
    Run(RunArgs),
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },
    /// Load and validate the config file.
    Validate {
        #[arg(long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },
    /// List registered platform templates.
    Templates {
        #[arg(long, default_value = CONFIG_FILE)]
        config: PathBuf,
    },
    /// List built-in personas.
    Personas,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    topic: String,
    #[arg(long)]
    platform: Platform,
    /// Built-in persona id.
    #[arg(long, conflicts_with = "custom_voice")]
    persona: Option<String>,
    /// Display name for a custom persona.
    #[arg(long, requires = "custom_voice")]
    custom_name: Option<String>,
    /// Voice instruction for a custom persona.
    #[arg(long)]
    custom_voice: Option<String>,
    /// Override `workflow.max_iterations`.
    #[arg(long)]
    max_iterations: Option<u32>,
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,
    /// Write the run report under this directory.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Print a JSON summary instead of the draft.
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn persona(&self) -> PersonaSelector {
        match &self.custom_voice {
            Some(voice) => PersonaSelector::Custom {
                name: self.custom_name.clone().unwrap_or_default(),
                voice: voice.clone(),
            },
            None => PersonaSelector::registered(
                self.persona.as_deref().unwrap_or(DEFAULT_PERSONA),
            ),
        }
    }
}

#[derive(Serialize)]
struct RunSummary<'a> {
    run_id: &'a str,
    terminal_reason: TerminalReason,
    terminal_output: Option<&'a str>,
    error: Option<&'a RunError>,
    iterations: u32,
    scores: Vec<f64>,
}

impl<'a> RunSummary<'a> {
    fn new(result: &'a RunResult) -> Self {
        let state = result.state();
        Self {
            run_id: result.run_id(),
            terminal_reason: result.terminal_reason(),
            terminal_output: result.terminal_output(),
            error: result.error(),
            iterations: state.iteration_count(),
            scores: state
                .history()
                .iter()
                .map(|snapshot| snapshot.review.score)
                .collect(),
        }
    }
}

#[tokio::main]
async fn main() {
    logging::init();
    let code = match dispatch(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Init { force, config } => cmd_init(&config, force).map(|()| exit_codes::OK),
        Command::Validate { config } => cmd_validate(&config).map(|()| exit_codes::OK),
        Command::Templates { config } => cmd_templates(&config).map(|()| exit_codes::OK),
        Command::Personas => {
            cmd_personas();
            Ok(exit_codes::OK)
        }
    }
}

async fn cmd_run(args: RunArgs) -> Result<i32> {
    let cfg = load_config(&args.config)?;
    let generator: Arc<dyn Generator> = Arc::new(ChatGenerator::from_config(&cfg.generation)?);
    let prompts = || {
        PromptBuilder::new(cfg.generation.prompt_budget_bytes).context("load prompt templates")
    };
    let judge = LlmJudge::new(generator.clone(), prompts()?);
    let analyzer = LlmIntentAnalyzer::new(generator.clone(), prompts()?);
    let collaborators = Collaborators {
        retriever: Arc::new(TavilyRetriever::from_config(&cfg.search)?),
        generator,
        evaluator: Arc::new(judge),
        analyzer: Some(Arc::new(analyzer)),
    };
    let engine = WorkflowEngine::from_config(&cfg, &collaborators)?;

    let run_config = RunConfig::new(args.topic.clone(), args.platform, args.persona())
        .with_max_iterations(args.max_iterations.unwrap_or(cfg.workflow.max_iterations))
        .with_thresholds(cfg.thresholds());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            trigger.cancel();
        }
    });

    let result = engine
        .run_with_observer(run_config, &cancel, |event| debug!(?event, "run event"))
        .await;

    if let Some(out) = &args.out {
        let paths = write_run_report(out, &result)?;
        eprintln!("report written to {}", paths.dir.display());
    }
    if args.json {
        let summary = serde_json::to_string_pretty(&RunSummary::new(&result))
            .context("serialize run summary")?;
        println!("{summary}");
    } else {
        if let Some(output) = result.terminal_output() {
            println!("{output}");
        }
        if result.terminal_reason() == TerminalReason::MaxIterationsExhausted {
            eprintln!("quality bar not reached; printed the best draft");
        }
        if let Some(err) = result.error() {
            eprintln!("run failed ({:?}): {}", err.kind, err.message);
        }
    }
    Ok(exit_codes::for_reason(result.terminal_reason()))
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &NexusConfig::default())
        .with_context(|| format!("write {}", path.display()))
}

fn cmd_validate(path: &Path) -> Result<()> {
    let cfg = load_config(path)?;
    template_registry(&cfg)?;
    println!("{} is valid", path.display());
    Ok(())
}

fn cmd_templates(path: &Path) -> Result<()> {
    let cfg = load_config(path)?;
    for template in template_registry(&cfg)?.iter() {
        let platform = template.platform.map_or("any", Platform::as_str);
        println!("{}\t{}\t{}", template.id, platform, template.name);
    }
    Ok(())
}

fn cmd_personas() {
    for persona in PersonaRegistry::builtin().iter() {
        println!("{}\t{}\t{}", persona.id, persona.name, persona.description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["nexus", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false, .. }));
    }

    #[test]
    fn parse_run_with_registered_persona() {
        let cli = Cli::parse_from([
            "nexus",
            "run",
            "--topic",
            "remote work",
            "--platform",
            "LinkedIn",
            "--persona",
            "jobs",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.platform, Platform::Linkedin);
        assert_eq!(args.persona(), PersonaSelector::registered("jobs"));
        assert_eq!(args.config, PathBuf::from(CONFIG_FILE));
    }

    #[test]
    fn parse_run_defaults_persona() {
        let cli = Cli::parse_from(["nexus", "run", "--topic", "t o p", "--platform", "blog"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.persona(), PersonaSelector::registered(DEFAULT_PERSONA));
    }

    #[test]
    fn parse_run_with_custom_voice() {
        let cli = Cli::parse_from([
            "nexus",
            "run",
            "--topic",
            "remote work",
            "--platform",
            "twitter",
            "--custom-name",
            "Ada",
            "--custom-voice",
            "Precise and warm.",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(
            args.persona(),
            PersonaSelector::Custom {
                name: "Ada".to_string(),
                voice: "Precise and warm.".to_string(),
            }
        );
    }

    #[test]
    fn custom_voice_conflicts_with_persona() {
        let parsed = Cli::try_parse_from([
            "nexus",
            "run",
            "--topic",
            "remote work",
            "--platform",
            "blog",
            "--persona",
            "jobs",
            "--custom-voice",
            "x",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let parsed =
            Cli::try_parse_from(["nexus", "run", "--topic", "x", "--platform", "myspace"]);
        assert!(parsed.is_err());
    }
}
