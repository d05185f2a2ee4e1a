//! Shared deterministic types for the workflow core.
//!
//! These types define stable contracts between the engine, the decision
//! policy and the stages. They do not depend on external state or I/O and
//! serialize to a stable JSON shape for run reports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default number of loop-backs a run may take after the initial pass.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Default creative score a draft must reach to be published.
pub const DEFAULT_CREATIVE_THRESHOLD: f64 = 8.5;

/// Default readability ceiling (Flesch-Kincaid grade).
pub const DEFAULT_MAX_READABILITY_GRADE: u32 = 10;

/// Target publishing platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    Twitter,
    Blog,
    Instagram,
    Youtube,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Linkedin,
        Platform::Twitter,
        Platform::Blog,
        Platform::Instagram,
        Platform::Youtube,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Blog => "blog",
            Platform::Instagram => "instagram",
            Platform::Youtube => "youtube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let needle = raw.trim().to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|platform| platform.as_str() == needle)
            .ok_or_else(|| {
                let known: Vec<&str> = Platform::ALL.iter().map(|p| p.as_str()).collect();
                format!("unknown platform '{raw}' (expected one of: {})", known.join(", "))
            })
    }
}

/// Which persona voices the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersonaSelector {
    /// A persona looked up by id in the persona registry.
    Registered { id: String },
    /// Caller-supplied voice parameters that bypass the registry.
    Custom { name: String, voice: String },
}

impl PersonaSelector {
    pub fn registered(id: impl Into<String>) -> Self {
        PersonaSelector::Registered { id: id.into() }
    }
}

/// Resolved persona voice parameters handed to the writer and reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    /// System instruction describing the voice.
    pub voice: String,
}

/// Quality bar a draft must clear to be published.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Minimum creative score on the 0-10 scale.
    pub creative_threshold: f64,
    /// Highest acceptable Flesch-Kincaid grade.
    pub max_readability_grade: u32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            creative_threshold: DEFAULT_CREATIVE_THRESHOLD,
            max_readability_grade: DEFAULT_MAX_READABILITY_GRADE,
        }
    }
}

/// Immutable input for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub topic: String,
    pub platform: Platform,
    pub persona: PersonaSelector,
    pub thresholds: QualityThresholds,
    pub max_iterations: u32,
}

impl RunConfig {
    pub fn new(topic: impl Into<String>, platform: Platform, persona: PersonaSelector) -> Self {
        Self {
            topic: topic.into(),
            platform,
            persona,
            thresholds: QualityThresholds::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

/// A verified fact snippet with its citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub text: String,
    pub source: String,
}

impl Fact {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            f.write_str(&self.text)
        } else {
            write!(f, "{} [Source: {}]", self.text, self.source)
        }
    }
}

/// Deterministic formatting rules a template imposes on a draft.
///
/// Every field is optional so registry entries only declare what they check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateRules {
    /// Template-specific readability ceiling; the stricter of this and the
    /// run threshold applies.
    pub readability_target: Option<u32>,
    pub paragraph_max_lines: Option<usize>,
    pub hook_max_lines: Option<usize>,
    pub hook_chars_per_line: Option<usize>,
    /// Separator between platform segments (tweets in a thread).
    pub segment_separator: Option<String>,
    pub segment_max_chars: Option<usize>,
    /// Literal markers that must appear somewhere in the draft.
    pub required_markers: Vec<String>,
    pub empty_line_after_hook: bool,
    pub keyword_density_min: Option<f64>,
    pub keyword_density_max: Option<f64>,
}

/// A platform content structure ("DNA") from the template registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub id: String,
    pub name: String,
    /// `None` for the platform-agnostic fallback.
    pub platform: Option<Platform>,
    pub structure: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub rules: TemplateRules,
}

/// Compliance rule that produced a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    BannedPhrase,
    ReadabilityGrade,
    ParagraphLength,
    HookLength,
    SegmentLength,
    MissingMarker,
    HookSpacing,
    KeywordDensity,
    FactUsage,
}

impl Rule {
    /// Structural rules report a mismatch between the draft and its template.
    /// Failing one of them sends the run back to the router instead of the writer.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Rule::SegmentLength | Rule::MissingMarker | Rule::HookSpacing
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fails compliance.
    Error,
    /// Reported to the writer but does not fail compliance.
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: Rule,
    pub severity: Severity,
    pub detail: String,
}

/// Measurements taken while checking compliance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceMetrics {
    pub readability_grade: f64,
    pub word_count: usize,
    pub fact_usage_rate: Option<f64>,
    pub keyword_density: Option<f64>,
}

/// Result of the deterministic checks run against one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub passed: bool,
    pub violations: Vec<Violation>,
    pub metrics: ComplianceMetrics,
}

impl ComplianceReport {
    /// Build a report whose `passed` flag is derived from the violations.
    pub fn from_violations(violations: Vec<Violation>, metrics: ComplianceMetrics) -> Self {
        let passed = !violations
            .iter()
            .any(|violation| violation.severity == Severity::Error);
        Self {
            passed,
            violations,
            metrics,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|violation| violation.severity == Severity::Error)
    }

    pub fn has_structural_failure(&self) -> bool {
        self.errors().any(|violation| violation.rule.is_structural())
    }
}

/// Creative score (0-10) and feedback from the review stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeReview {
    pub score: f64,
    pub feedback: String,
}

/// The five pipeline stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Research,
    Route,
    Write,
    Optimize,
    Review,
}

impl StageName {
    pub const ALL: [StageName; 5] = [
        StageName::Research,
        StageName::Route,
        StageName::Write,
        StageName::Optimize,
        StageName::Review,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Research => "research",
            StageName::Route => "route",
            StageName::Write => "write",
            StageName::Optimize => "optimize",
            StageName::Review => "review",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage a revision loops back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviseTarget {
    Write,
    Route,
}

impl ReviseTarget {
    pub fn stage(self) -> StageName {
        match self {
            ReviseTarget::Write => StageName::Write,
            ReviseTarget::Route => StageName::Route,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    MaxIterationsExhausted,
}

/// Output of the decision node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Transition {
    Publish,
    Revise(ReviseTarget),
    Abort(AbortReason),
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    Published,
    MaxIterationsExhausted,
    Failed,
}

/// Record of one completed research-to-review pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSnapshot {
    /// 0-indexed pass number (equals the iteration count during the pass).
    pub iteration: u32,
    pub template_id: Option<String>,
    pub draft: String,
    pub compliance: ComplianceReport,
    pub review: CreativeReview,
    pub transition: Transition,
}
