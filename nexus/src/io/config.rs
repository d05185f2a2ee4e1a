//! Workflow configuration stored in `nexus.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::research_plan::MAX_QUERIES;
use crate::core::types::{
    DEFAULT_CREATIVE_THRESHOLD, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_READABILITY_GRADE,
    QualityThresholds, TemplateSpec,
};
use crate::io::prompt::DEFAULT_BUDGET_BYTES;
use crate::io::retry::CallPolicy;

/// Default config file name.
pub const CONFIG_FILE: &str = "nexus.toml";

/// Highest loop-back budget a run may request.
pub const MAX_ITERATIONS_CEILING: u32 = 10;

/// Built-in banned phrases (overused, generic marketing vocabulary).
pub const DEFAULT_BANNED_PHRASES: [&str; 17] = [
    "delve",
    "unleash",
    "tapestry",
    "realm",
    "leverage",
    "synergy",
    "paradigm shift",
    "game-changer",
    "cutting-edge",
    "innovative",
    "revolutionize",
    "next-generation",
    "robust",
    "disrupt",
    "transform",
    "empower",
    "optimize",
];

/// Workflow configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NexusConfig {
    /// Replaces the built-in banned-phrase list when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banned_phrases: Option<Vec<String>>,
    pub workflow: WorkflowConfig,
    pub retry: RetryConfig,
    pub research: ResearchConfig,
    pub generation: GenerationConfig,
    pub search: SearchConfig,
    /// Extra template registry entries, appended after the built-ins.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    pub max_iterations: u32,
    pub creative_threshold: f64,
    pub max_readability_grade: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            creative_threshold: DEFAULT_CREATIVE_THRESHOLD,
            max_readability_grade: DEFAULT_MAX_READABILITY_GRADE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt, for transient failures only.
    pub max_retries: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Bound on a single collaborator call.
    pub call_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            min_delay_ms: 500,
            max_delay_ms: 8_000,
            call_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResearchConfig {
    pub max_queries: usize,
    pub results_per_query: usize,
    pub max_facts: usize,
    /// Issue sub-queries concurrently.
    pub parallel: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_queries: MAX_QUERIES,
            results_per_query: 3,
            max_facts: 12,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub writer_model: String,
    pub reviewer_model: String,
    pub writer_temperature: f32,
    pub reviewer_temperature: f32,
    pub max_tokens: u32,
    pub prompt_budget_bytes: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            writer_model: "llama-3.3-70b-versatile".to_string(),
            reviewer_model: "llama-3.1-8b-instant".to_string(),
            writer_temperature: 0.8,
            reviewer_temperature: 0.2,
            max_tokens: 2_048,
            prompt_budget_bytes: DEFAULT_BUDGET_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key_env: String,
    /// Tavily search depth (`basic` or `advanced`).
    pub depth: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tavily.com".to_string(),
            api_key_env: "TAVILY_API_KEY".to_string(),
            depth: "advanced".to_string(),
        }
    }
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            banned_phrases: None,
            workflow: WorkflowConfig::default(),
            retry: RetryConfig::default(),
            research: ResearchConfig::default(),
            generation: GenerationConfig::default(),
            search: SearchConfig::default(),
            templates: Vec::new(),
        }
    }
}

impl NexusConfig {
    pub fn validate(&self) -> Result<()> {
        let workflow = &self.workflow;
        if workflow.max_iterations > MAX_ITERATIONS_CEILING {
            return Err(anyhow!(
                "workflow.max_iterations must be <= {MAX_ITERATIONS_CEILING}"
            ));
        }
        if !(0.0..=10.0).contains(&workflow.creative_threshold) {
            return Err(anyhow!("workflow.creative_threshold must be within 0..=10"));
        }
        if self.retry.call_timeout_secs == 0 {
            return Err(anyhow!("retry.call_timeout_secs must be > 0"));
        }
        if self.retry.min_delay_ms > self.retry.max_delay_ms {
            return Err(anyhow!("retry.min_delay_ms must be <= retry.max_delay_ms"));
        }
        if !(1..=MAX_QUERIES).contains(&self.research.max_queries) {
            return Err(anyhow!("research.max_queries must be within 1..={MAX_QUERIES}"));
        }
        if self.research.results_per_query == 0 || self.research.max_facts == 0 {
            return Err(anyhow!(
                "research.results_per_query and research.max_facts must be > 0"
            ));
        }
        if self.generation.prompt_budget_bytes == 0 {
            return Err(anyhow!("generation.prompt_budget_bytes must be > 0"));
        }
        for (name, value) in [
            ("generation.base_url", &self.generation.base_url),
            ("generation.api_key_env", &self.generation.api_key_env),
            ("generation.writer_model", &self.generation.writer_model),
            ("generation.reviewer_model", &self.generation.reviewer_model),
            ("search.base_url", &self.search.base_url),
            ("search.api_key_env", &self.search.api_key_env),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{name} must not be empty"));
            }
        }
        for template in &self.templates {
            if template.platform.is_none() {
                return Err(anyhow!("template '{}' must name a platform", template.id));
            }
        }
        Ok(())
    }

    pub fn thresholds(&self) -> QualityThresholds {
        QualityThresholds {
            creative_threshold: self.workflow.creative_threshold,
            max_readability_grade: self.workflow.max_readability_grade,
        }
    }

    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            max_retries: self.retry.max_retries,
            min_delay: Duration::from_millis(self.retry.min_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            timeout: Duration::from_secs(self.retry.call_timeout_secs),
        }
    }

    /// The active banned-phrase list.
    pub fn banned_phrases(&self) -> Vec<String> {
        match &self.banned_phrases {
            Some(phrases) => phrases.clone(),
            None => DEFAULT_BANNED_PHRASES.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `NexusConfig::default()`.
pub fn load_config(path: &Path) -> Result<NexusConfig> {
    if !path.exists() {
        let cfg = NexusConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: NexusConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &NexusConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `contents` to `path` through a sibling temp file and rename.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("path has no file name {}", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
