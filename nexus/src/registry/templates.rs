//! Platform template ("DNA") registry.
//!
//! Platform entries are kept in registration order. The universal fallback
//! is never returned by [`TemplateRegistry::lookup`]; it only appears as the
//! last re-routing candidate for platforms that have their own templates.

use crate::core::types::{Platform, TemplateRules, TemplateSpec};

/// Id of the platform-agnostic fallback template.
pub const UNIVERSAL_ID: &str = "universal";

#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<TemplateSpec>,
    universal: TemplateSpec,
}

impl TemplateRegistry {
    /// Registry with only the universal fallback.
    pub fn empty() -> Self {
        Self {
            templates: Vec::new(),
            universal: universal(),
        }
    }

    /// Registry with the built-in linkedin, twitter and blog templates.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.templates = vec![linkedin(), twitter(), blog()];
        registry
    }

    /// Add a template. Ids must be unique and platform templates must name a platform.
    pub fn register(&mut self, template: TemplateSpec) -> Result<(), String> {
        if template.id.trim().is_empty() {
            return Err("template id must not be empty".to_string());
        }
        if template.platform.is_none() {
            return Err(format!(
                "template '{}' must name a platform",
                template.id
            ));
        }
        if self.get(&template.id).is_some() {
            return Err(format!("duplicate template id '{}'", template.id));
        }
        self.templates.push(template);
        Ok(())
    }

    /// First template registered for `platform`.
    pub fn lookup(&self, platform: Platform) -> Option<&TemplateSpec> {
        self.for_platform(platform).next()
    }

    /// Re-routing order for `platform`: its templates, then the universal fallback.
    ///
    /// Empty when the platform has no template of its own.
    pub fn candidates(&self, platform: Platform) -> Vec<&TemplateSpec> {
        let mut candidates: Vec<&TemplateSpec> = self.for_platform(platform).collect();
        if !candidates.is_empty() {
            candidates.push(&self.universal);
        }
        candidates
    }

    pub fn get(&self, id: &str) -> Option<&TemplateSpec> {
        if id == self.universal.id {
            return Some(&self.universal);
        }
        self.templates.iter().find(|template| template.id == id)
    }

    /// All templates, universal last.
    pub fn iter(&self) -> impl Iterator<Item = &TemplateSpec> {
        self.templates.iter().chain(std::iter::once(&self.universal))
    }

    fn for_platform(&self, platform: Platform) -> impl Iterator<Item = &TemplateSpec> {
        self.templates
            .iter()
            .filter(move |template| template.platform == Some(platform))
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn linkedin() -> TemplateSpec {
    TemplateSpec {
        id: "linkedin.scroll-stopper".to_string(),
        name: "The Scroll-Stopper".to_string(),
        platform: Some(Platform::Linkedin),
        structure: "\
TRIGGER:
Line 1: hook (one punchy sentence)
Line 2: empty
Line 3: re-hook that earns the \"see more\" click

MEAT:
Short paragraphs, at most two lines each, separated by empty lines.

TWIST:
One unexpected insight.

ENGAGEMENT:
A specific question for the comments."
            .to_string(),
        examples: vec![
            "\
I reviewed 1,000 LinkedIn posts last month.

Here is what actually works:

1. The hook creates a knowledge gap
2. \"You\" beats \"I\" in the first lines
3. White space wins

Most people get #2 wrong.

What is your biggest LinkedIn struggle?"
                .to_string(),
        ],
        rules: TemplateRules {
            readability_target: Some(8),
            paragraph_max_lines: Some(2),
            hook_max_lines: Some(2),
            hook_chars_per_line: Some(40),
            empty_line_after_hook: true,
            ..TemplateRules::default()
        },
    }
}

fn twitter() -> TemplateSpec {
    TemplateSpec {
        id: "twitter.thread".to_string(),
        name: "The Velocity Thread".to_string(),
        platform: Some(Platform::Twitter),
        structure: "\
TWEET 1: hook plus one line of validation
TWEET 2: the thread marker 🧵
TWEETS 3..N: one idea per tweet, numbered 1/, 2/, ...
FINAL TWEET: TL;DR summary and a call to action

Separate tweets with one empty line. Each tweet stays under 280 characters."
            .to_string(),
        examples: vec![
            "\
90% of productivity advice is noise.

I tested 50 methods over 2 years. Only 3 worked.

🧵

1/ The two-minute rule.

2/ Single-tasking mornings.

3/ A hard stop at 6pm.

TL;DR: fewer rules, kept daily. Follow for more."
                .to_string(),
        ],
        rules: TemplateRules {
            segment_separator: Some("\n\n".to_string()),
            segment_max_chars: Some(280),
            required_markers: vec!["🧵".to_string()],
            ..TemplateRules::default()
        },
    }
}

fn blog() -> TemplateSpec {
    TemplateSpec {
        id: "blog.seo-article".to_string(),
        name: "The Search Engine Eater".to_string(),
        platform: Some(Platform::Blog),
        structure: "\
# Title containing the primary keyword

Introduction: problem, agitation, solution. Keyword within the first 100 words.

## Core concept 1
## Core concept 2 (with a bullet list)
## Core concept 3

Conclusion with key takeaways and a call to action."
            .to_string(),
        examples: Vec::new(),
        rules: TemplateRules {
            readability_target: Some(8),
            required_markers: vec!["## ".to_string()],
            keyword_density_min: Some(0.5),
            keyword_density_max: Some(2.5),
            ..TemplateRules::default()
        },
    }
}

fn universal() -> TemplateSpec {
    TemplateSpec {
        id: UNIVERSAL_ID.to_string(),
        name: "The Universal Master Key".to_string(),
        platform: None,
        structure: "\
OPENING: hook

BODY: main content in short paragraphs separated by empty lines

CLOSING: call to action"
            .to_string(),
        examples: Vec::new(),
        rules: TemplateRules {
            readability_target: Some(8),
            paragraph_max_lines: Some(3),
            ..TemplateRules::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extra(id: &str, platform: Platform) -> TemplateSpec {
        TemplateSpec {
            id: id.to_string(),
            name: id.to_string(),
            platform: Some(platform),
            structure: "custom".to_string(),
            examples: Vec::new(),
            rules: TemplateRules::default(),
        }
    }

    #[test]
    fn builtin_covers_three_platforms() {
        let registry = TemplateRegistry::builtin();
        assert_eq!(
            registry.lookup(Platform::Linkedin).map(|t| t.id.as_str()),
            Some("linkedin.scroll-stopper")
        );
        assert!(registry.lookup(Platform::Twitter).is_some());
        assert!(registry.lookup(Platform::Blog).is_some());
        assert!(registry.lookup(Platform::Instagram).is_none());
        assert!(registry.lookup(Platform::Youtube).is_none());
    }

    #[test]
    fn candidates_end_with_universal() {
        let mut registry = TemplateRegistry::builtin();
        registry
            .register(extra("linkedin.story", Platform::Linkedin))
            .expect("register");
        let ids: Vec<&str> = registry
            .candidates(Platform::Linkedin)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["linkedin.scroll-stopper", "linkedin.story", UNIVERSAL_ID]);
    }

    #[test]
    fn unsupported_platform_has_no_candidates() {
        assert!(TemplateRegistry::builtin()
            .candidates(Platform::Instagram)
            .is_empty());
    }

    #[test]
    fn register_rejects_duplicates_and_platformless() {
        let mut registry = TemplateRegistry::builtin();
        let err = registry
            .register(extra("twitter.thread", Platform::Twitter))
            .unwrap_err();
        assert!(err.contains("duplicate"));

        let mut orphan = extra("orphan", Platform::Blog);
        orphan.platform = None;
        assert!(registry.register(orphan).is_err());

        let err = registry.register(extra(UNIVERSAL_ID, Platform::Blog)).unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn registered_platform_becomes_routable() {
        let mut registry = TemplateRegistry::builtin();
        registry
            .register(extra("instagram.carousel", Platform::Instagram))
            .expect("register");
        assert_eq!(registry.candidates(Platform::Instagram).len(), 2);
        assert!(registry.get("instagram.carousel").is_some());
        assert!(registry.get(UNIVERSAL_ID).is_some());
    }
}
