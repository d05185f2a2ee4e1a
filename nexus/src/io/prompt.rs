//! Prompt rendering for the writer, the intent analyzer and the LLM judge.
//!
//! Templates are embedded minijinja documents split into marked sections
//! (`<!-- section:KEY required|droppable -->`). Droppable sections are removed
//! in a fixed order until the prompt fits the byte budget.

use std::sync::LazyLock;

use minijinja::{Environment, context};
use regex::Regex;
use tracing::debug;

use crate::core::intent::{ContentIntent, INTENT_CATEGORIES};
use crate::core::types::{Fact, PersonaProfile, Platform, TemplateRules, TemplateSpec};
use crate::io::collaborator::EvaluationRequest;

const WRITER_TEMPLATE: &str = include_str!("prompts/writer.md");
const REVIEWER_TEMPLATE: &str = include_str!("prompts/reviewer.md");
const INTENT_TEMPLATE: &str = include_str!("prompts/intent.md");

/// Default prompt budget in bytes.
pub const DEFAULT_BUDGET_BYTES: usize = 12_000;

/// Writer sections dropped under budget pressure, first to last.
const DROP_ORDER: [&str; 3] = ["examples", "previous", "facts"];

const TRUNCATION_NOTICE: &str = "\n[truncated]";

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").unwrap()
});

/// Everything the writer prompt is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct WriterPromptInput<'a> {
    pub topic: &'a str,
    pub platform: Platform,
    pub persona: &'a PersonaProfile,
    pub template: &'a TemplateSpec,
    pub facts: &'a [Fact],
    /// Intent and keyword from research, when analyzed.
    pub intent: Option<&'a ContentIntent>,
    /// Draft from the pass being revised.
    pub previous_draft: Option<&'a str>,
    /// Revision feedback for the pass being revised.
    pub feedback: Option<&'a str>,
    pub banned_phrases: &'a [String],
}

#[derive(Debug, Clone)]
struct ParsedSection {
    key: String,
    required: bool,
    content: String,
}

/// Builds writer, analyzer and reviewer prompts within a byte budget.
pub struct PromptBuilder {
    env: Environment<'static>,
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("writer", WRITER_TEMPLATE)?;
        env.add_template("reviewer", REVIEWER_TEMPLATE)?;
        env.add_template("intent", INTENT_TEMPLATE)?;
        Ok(Self { env, budget_bytes })
    }

    pub fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    pub fn build_writer(&self, input: &WriterPromptInput<'_>) -> Result<String, minijinja::Error> {
        let facts: Vec<String> = input.facts.iter().map(Fact::to_string).collect();
        let rendered = self.env.get_template("writer")?.render(context! {
            topic => input.topic.trim(),
            platform => input.platform.as_str(),
            persona => input.persona,
            template => input.template,
            rules => describe_rules(&input.template.rules),
            banned => input.banned_phrases,
            facts => facts,
            intent => input.intent,
            examples => &input.template.examples,
            previous => input.previous_draft.map(str::trim).filter(|s| !s.is_empty()),
            feedback => input.feedback.map(str::trim).filter(|s| !s.is_empty()),
        })?;

        let mut sections = parse_sections(&rendered);
        apply_budget(&mut sections, self.budget_bytes);
        Ok(join_sections(&sections))
    }

    pub fn build_reviewer(&self, request: &EvaluationRequest) -> Result<String, minijinja::Error> {
        let rendered = self.env.get_template("reviewer")?.render(context! {
            topic => request.topic.trim(),
            platform => request.platform.as_str(),
            persona => &request.persona,
            iteration => request.iteration,
            banned => &request.banned_hits,
            draft => request.draft.trim(),
        })?;

        let mut sections = parse_sections(&rendered);
        apply_budget(&mut sections, self.budget_bytes);
        Ok(join_sections(&sections))
    }

    pub fn build_intent(&self, topic: &str, platform: Platform) -> Result<String, minijinja::Error> {
        let rendered = self.env.get_template("intent")?.render(context! {
            topic => topic.trim(),
            platform => platform.as_str(),
            categories => INTENT_CATEGORIES,
        })?;
        Ok(join_sections(&parse_sections(&rendered)))
    }
}

/// Human-readable lines for the rules a template declares.
pub fn describe_rules(rules: &TemplateRules) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(grade) = rules.readability_target {
        lines.push(format!("Readability at or below grade {grade}"));
    }
    if let Some(max) = rules.hook_max_lines {
        let width = rules.hook_chars_per_line.unwrap_or(40);
        lines.push(format!(
            "Hook fits in {max} lines of about {width} characters"
        ));
    }
    if rules.empty_line_after_hook {
        lines.push("Leave an empty line right after the hook".to_string());
    }
    if let Some(max) = rules.paragraph_max_lines {
        lines.push(format!("Paragraphs of at most {max} lines"));
    }
    if let Some(max) = rules.segment_max_chars {
        lines.push(format!(
            "Each segment (separated by an empty line) under {max} characters"
        ));
    }
    for marker in &rules.required_markers {
        lines.push(format!("Include \"{}\"", marker.trim()));
    }
    if let (Some(min), Some(max)) = (rules.keyword_density_min, rules.keyword_density_max) {
        lines.push(format!(
            "Primary keyword density between {min}% and {max}%"
        ));
    }
    lines
}

fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let markers: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::new();

    for (index, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = markers
            .get(index + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |next| next.start());
        let content = rendered[whole.end()..end].trim().to_string();
        let required = kind.as_str() == "required";
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }
    sections
}

fn total_len(sections: &[ParsedSection]) -> usize {
    sections.iter().map(|section| section.content.len()).sum()
}

fn apply_budget(sections: &mut Vec<ParsedSection>, budget: usize) {
    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            return;
        }
        if let Some(index) = sections.iter().position(|s| s.key == key && !s.required) {
            let dropped = sections.remove(index);
            debug!(
                section = key,
                bytes_dropped = dropped.content.len(),
                "dropped prompt section for budget"
            );
        }
    }

    let total = total_len(sections);
    if total <= budget {
        return;
    }
    let Some(last) = sections.last_mut() else {
        return;
    };
    let allowed = budget.saturating_sub(total - last.content.len());
    let before_len = last.content.len();
    if allowed > TRUNCATION_NOTICE.len() {
        truncate_on_char_boundary(&mut last.content, allowed - TRUNCATION_NOTICE.len());
        last.content.push_str(TRUNCATION_NOTICE);
    } else {
        truncate_on_char_boundary(&mut last.content, allowed);
    }
    debug!(
        section = %last.key,
        before_len,
        after_len = last.content.len(),
        "truncated prompt section for budget"
    );
}

fn truncate_on_char_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

fn join_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|section| section.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{PersonaRegistry, TemplateRegistry};

    fn persona() -> PersonaProfile {
        PersonaRegistry::builtin()
            .lookup("jobs")
            .cloned()
            .expect("jobs")
    }

    fn template(platform: Platform) -> TemplateSpec {
        TemplateRegistry::builtin()
            .lookup(platform)
            .cloned()
            .expect("template")
    }

    /// Verifies a first-pass prompt carries contract, structure, rules, facts
    /// and examples in a stable order, with no revision sections.
    #[test]
    fn first_pass_prompt_ordering_is_stable() {
        let persona = persona();
        let template = template(Platform::Linkedin);
        let facts = vec![Fact::new("Remote work rose 40%", "https://example.com")];
        let banned = vec!["delve".to_string()];
        let prompt = PromptBuilder::new(DEFAULT_BUDGET_BYTES)
            .expect("builder")
            .build_writer(&WriterPromptInput {
                topic: "remote work",
                platform: Platform::Linkedin,
                persona: &persona,
                template: &template,
                facts: &facts,
                intent: None,
                previous_draft: None,
                feedback: None,
                banned_phrases: &banned,
            })
            .expect("render");

        let contract = prompt.find("### Writing Contract").expect("contract");
        let structure = prompt.find("### Template: The Scroll-Stopper").expect("template");
        let rules = prompt.find("### Formatting Rules").expect("rules");
        let fact_pos = prompt.find("### Verified Facts").expect("facts");
        let examples = prompt.find("### Examples").expect("examples");
        assert!(contract < structure && structure < rules);
        assert!(rules < fact_pos && fact_pos < examples);
        assert!(prompt.contains("Never use these phrases: delve"));
        assert!(prompt.contains("Remote work rose 40% [Source: https://example.com]"));
        assert!(!prompt.contains("### Previous Draft"));
        assert!(!prompt.contains("### Revision Feedback"));
        assert!(!prompt.contains("<!--"));
    }

    /// Verifies revision prompts carry feedback and the previous draft.
    #[test]
    fn revision_prompt_includes_feedback_and_previous_draft() {
        let persona = persona();
        let template = template(Platform::Twitter);
        let prompt = PromptBuilder::new(DEFAULT_BUDGET_BYTES)
            .expect("builder")
            .build_writer(&WriterPromptInput {
                topic: "remote work",
                platform: Platform::Twitter,
                persona: &persona,
                template: &template,
                facts: &[],
                intent: None,
                previous_draft: Some("old draft"),
                feedback: Some("REVISION INSTRUCTIONS:\n- Make the hook more provocative"),
                banned_phrases: &[],
            })
            .expect("render");
        let feedback = prompt.find("### Revision Feedback").expect("feedback");
        let previous = prompt.find("### Previous Draft").expect("previous");
        assert!(feedback < previous);
        assert!(prompt.contains("old draft"));
        assert!(!prompt.contains("### Verified Facts"));
    }

    /// Verifies budget enforcement drops examples, then the previous draft,
    /// before touching facts or required sections.
    #[test]
    fn budget_drops_examples_then_previous_first() {
        let persona = persona();
        let mut template = template(Platform::Linkedin);
        template.examples = vec!["example ".repeat(200)];
        let facts = vec![Fact::new("short fact", "s")];
        let previous = "previous ".repeat(200);
        let input = WriterPromptInput {
            topic: "remote work",
            platform: Platform::Linkedin,
            persona: &persona,
            template: &template,
            facts: &facts,
            intent: None,
            previous_draft: Some(&previous),
            feedback: Some("fix the hook"),
            banned_phrases: &[],
        };
        let full = PromptBuilder::new(usize::MAX)
            .expect("builder")
            .build_writer(&input)
            .expect("render");
        let budget = full.len() - 2500;

        let prompt = PromptBuilder::new(budget)
            .expect("builder")
            .build_writer(&input)
            .expect("render");
        assert!(!prompt.contains("### Examples"), "examples dropped first");
        assert!(!prompt.contains("### Previous Draft"), "previous dropped second");
        assert!(prompt.contains("### Verified Facts"), "facts kept");
        assert!(prompt.contains("### Revision Feedback"), "feedback kept");
        assert!(prompt.contains("### Writing Contract"), "contract kept");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut sections = vec![ParsedSection {
            key: "draft".to_string(),
            required: true,
            content: "🧵".repeat(40),
        }];
        apply_budget(&mut sections, 30);
        let content = &sections[0].content;
        assert!(content.len() <= 30);
        assert!(content.ends_with(TRUNCATION_NOTICE));
    }

    #[test]
    fn writer_prompt_names_intent_and_keyword() {
        let persona = persona();
        let template = template(Platform::Blog);
        let intent = ContentIntent {
            primary_intent: "guide".to_string(),
            primary_keyword: "remote teams".to_string(),
            ..ContentIntent::fallback("remote work")
        };
        let prompt = PromptBuilder::new(DEFAULT_BUDGET_BYTES)
            .expect("builder")
            .build_writer(&WriterPromptInput {
                topic: "remote work",
                platform: Platform::Blog,
                persona: &persona,
                template: &template,
                facts: &[],
                intent: Some(&intent),
                previous_draft: None,
                feedback: None,
                banned_phrases: &[],
            })
            .expect("render");
        assert!(prompt.contains("- Intent: guide. Work the keyword \"remote teams\" in naturally."));
    }

    #[test]
    fn intent_prompt_lists_categories() {
        let prompt = PromptBuilder::new(DEFAULT_BUDGET_BYTES)
            .expect("builder")
            .build_intent("  remote work ", Platform::Linkedin)
            .expect("render");
        assert!(prompt.contains("Topic: remote work"));
        assert!(prompt.contains("Platform: linkedin"));
        assert!(prompt.contains("- launch"));
        assert!(prompt.contains("\"primary_keyword\""));
        assert!(!prompt.contains("<!--"));
    }

    #[test]
    fn reviewer_prompt_mentions_banned_hits() {
        let request = EvaluationRequest {
            draft: "Let us delve in.".to_string(),
            persona: persona(),
            platform: Platform::Blog,
            topic: "remote work".to_string(),
            iteration: 1,
            banned_hits: vec!["delve".to_string()],
        };
        let prompt = PromptBuilder::new(DEFAULT_BUDGET_BYTES)
            .expect("builder")
            .build_reviewer(&request)
            .expect("render");
        assert!(prompt.contains("Pass: 2"));
        assert!(prompt.contains("Banned phrases found by the compliance scan: delve"));
        assert!(prompt.contains("<draft>\nLet us delve in.\n</draft>"));
    }
}
