//! Deterministic compliance checks for one draft.
//!
//! Content problems are reported as [`Violation`]s; only an unmeasurable
//! draft is an error.

use thiserror::Error;

use crate::core::metrics::{self, PhraseMatcher};
use crate::core::types::{
    ComplianceMetrics, ComplianceReport, Fact, Rule, Severity, TemplateSpec, Violation,
};

/// Fact usage below this percentage is reported as a warning.
pub const MIN_FACT_USAGE: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error("draft is empty")]
    EmptyDraft,
    #[error("draft contains no words to measure")]
    NoWords,
}

/// Everything the checks read.
#[derive(Debug, Clone, Copy)]
pub struct ComplianceInput<'a> {
    pub draft: &'a str,
    /// Primary keyword for density bounds; `None` skips the check.
    pub keyword: Option<&'a str>,
    pub facts: &'a [Fact],
    pub template: Option<&'a TemplateSpec>,
    /// Run-level readability ceiling; a stricter template target wins.
    pub max_readability_grade: u32,
    pub banned: &'a PhraseMatcher,
}

/// Severity each rule reports with.
pub fn severity(rule: Rule) -> Severity {
    match rule {
        Rule::HookLength | Rule::KeywordDensity | Rule::FactUsage => Severity::Warning,
        Rule::BannedPhrase
        | Rule::ReadabilityGrade
        | Rule::ParagraphLength
        | Rule::SegmentLength
        | Rule::MissingMarker
        | Rule::HookSpacing => Severity::Error,
    }
}

fn flag(violations: &mut Vec<Violation>, rule: Rule, detail: String) {
    violations.push(Violation {
        rule,
        severity: severity(rule),
        detail,
    });
}

/// Run every check that applies to the draft and its template.
pub fn evaluate(input: &ComplianceInput<'_>) -> Result<ComplianceReport, MetricError> {
    let draft = input.draft;
    if draft.trim().is_empty() {
        return Err(MetricError::EmptyDraft);
    }
    let grade = metrics::flesch_kincaid_grade(draft).ok_or(MetricError::NoWords)?;
    let word_count = metrics::word_count(draft);
    let rules = input.template.map(|template| &template.rules);
    let mut violations = Vec::new();

    for hit in input.banned.find(draft) {
        flag(
            &mut violations,
            Rule::BannedPhrase,
            format!("banned phrase '{}' in \"{}\"", hit.phrase, hit.context),
        );
    }

    let ceiling = rules
        .and_then(|rules| rules.readability_target)
        .map_or(input.max_readability_grade, |target| {
            target.min(input.max_readability_grade)
        });
    if grade > f64::from(ceiling) {
        flag(
            &mut violations,
            Rule::ReadabilityGrade,
            format!("readability grade {grade} exceeds {ceiling}"),
        );
    }

    let mut keyword_density = None;
    if let Some(rules) = rules {
        if let Some(max_lines) = rules.paragraph_max_lines {
            for (index, paragraph) in metrics::paragraphs(draft).iter().enumerate() {
                let lines = metrics::line_count(paragraph);
                if lines > max_lines {
                    flag(
                        &mut violations,
                        Rule::ParagraphLength,
                        format!("paragraph {} has {lines} lines (max {max_lines})", index + 1),
                    );
                }
            }
        }

        if let (Some(max_lines), Some(hook)) = (rules.hook_max_lines, metrics::hook(draft)) {
            let per_line = rules.hook_chars_per_line.unwrap_or(40);
            let lines = metrics::visual_lines(hook, per_line);
            if lines > max_lines {
                flag(
                    &mut violations,
                    Rule::HookLength,
                    format!("hook spans about {lines} lines (max {max_lines})"),
                );
            }
        }

        if rules.empty_line_after_hook && !metrics::blank_line_after_first(draft) {
            flag(
                &mut violations,
                Rule::HookSpacing,
                "hook is not followed by an empty line".to_string(),
            );
        }

        if let Some(max_chars) = rules.segment_max_chars {
            let separator = rules.segment_separator.as_deref().unwrap_or("\n\n");
            for (index, segment) in metrics::segments(draft, separator).iter().enumerate() {
                let chars = segment.chars().count();
                if chars > max_chars {
                    flag(
                        &mut violations,
                        Rule::SegmentLength,
                        format!("segment {} has {chars} chars (max {max_chars})", index + 1),
                    );
                }
            }
        }

        for marker in &rules.required_markers {
            if !draft.contains(marker.as_str()) {
                flag(
                    &mut violations,
                    Rule::MissingMarker,
                    format!("required marker '{}' is missing", marker.trim()),
                );
            }
        }

        let bounded = rules.keyword_density_min.is_some() || rules.keyword_density_max.is_some();
        let keyword = input
            .keyword
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty());
        if let (true, Some(keyword)) = (bounded, keyword) {
            let density = metrics::keyword_density(draft, keyword);
            keyword_density = Some(density);
            if let Some(min) = rules.keyword_density_min.filter(|min| density < *min) {
                flag(
                    &mut violations,
                    Rule::KeywordDensity,
                    format!("keyword '{keyword}' density {density}% is below {min}%"),
                );
            }
            if let Some(max) = rules.keyword_density_max.filter(|max| density > *max) {
                flag(
                    &mut violations,
                    Rule::KeywordDensity,
                    format!("keyword '{keyword}' density {density}% is above {max}%"),
                );
            }
        }
    }

    let fact_usage_rate = metrics::fact_usage_rate(draft, input.facts);
    if let Some(rate) = fact_usage_rate.filter(|rate| *rate < MIN_FACT_USAGE) {
        flag(
            &mut violations,
            Rule::FactUsage,
            format!("low fact usage: {rate:.0}%"),
        );
    }

    Ok(ComplianceReport::from_violations(
        violations,
        ComplianceMetrics {
            readability_grade: grade,
            word_count,
            fact_usage_rate,
            keyword_density,
        },
    ))
}
