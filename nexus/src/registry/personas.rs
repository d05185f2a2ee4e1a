//! Persona registry: voice parameters for the writer and reviewer.

use crate::core::types::{PersonaProfile, PersonaSelector};

/// Id reported for caller-supplied personas.
pub const CUSTOM_ID: &str = "custom";

#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<PersonaProfile>,
}

impl PersonaRegistry {
    pub fn builtin() -> Self {
        let personas = BUILTIN
            .iter()
            .map(|(id, name, description, voice)| PersonaProfile {
                id: (*id).to_string(),
                name: (*name).to_string(),
                description: (*description).to_string(),
                voice: (*voice).to_string(),
            })
            .collect();
        Self { personas }
    }

    /// Case-insensitive lookup by id.
    pub fn lookup(&self, id: &str) -> Option<&PersonaProfile> {
        let id = id.trim();
        self.personas
            .iter()
            .find(|persona| persona.id.eq_ignore_ascii_case(id))
    }

    /// Resolve a selector into voice parameters.
    ///
    /// Custom selectors bypass the registry but must carry a voice instruction.
    pub fn resolve(&self, selector: &PersonaSelector) -> Result<PersonaProfile, String> {
        match selector {
            PersonaSelector::Registered { id } => self.lookup(id).cloned().ok_or_else(|| {
                let known: Vec<&str> = self.iter().map(|p| p.id.as_str()).collect();
                format!(
                    "unknown persona '{id}' (expected one of: {}, or a custom persona)",
                    known.join(", ")
                )
            }),
            PersonaSelector::Custom { name, voice } => {
                if voice.trim().is_empty() {
                    return Err("custom persona requires a voice instruction".to_string());
                }
                let name = match name.trim() {
                    "" => "Custom Persona",
                    name => name,
                };
                Ok(PersonaProfile {
                    id: CUSTOM_ID.to_string(),
                    name: name.to_string(),
                    description: "Caller-supplied voice".to_string(),
                    voice: voice.trim().to_string(),
                })
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PersonaProfile> {
        self.personas.iter()
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

const BUILTIN: [(&str, &str, &str, &str); 5] = [
    (
        "stark",
        "The Iron Futurist",
        "Confident, snarky, engineering-obsessed.",
        "Write as a brilliant, cocky engineer. Frame ideas through hardware and \
         engineering metaphors. Short sentences, zero fluff. Challenge conventional \
         thinking. Open with a challenge or a provocative question.",
    ),
    (
        "musk",
        "The Titan",
        "First principles, urgent, blunt.",
        "Write as a first-principles thinker. Reduce every claim to fundamentals and \
         numbers. Create urgency. Be blunt about bad ideas. Open with a bold \
         prediction or a cold hard fact.",
    ),
    (
        "jobs",
        "The Visionary",
        "Minimalist, emotional, focused on the why.",
        "Write with quiet intensity and radical simplicity. Use the fewest words \
         possible. Focus on feeling over features. No corporate jargon. Open with a \
         philosophical statement.",
    ),
    (
        "goggins",
        "The Commander",
        "Intense discipline, no excuses.",
        "Write as a relentless drill instructor. Treat excuses as the enemy. Give \
         orders, not suggestions. Capitalize key action verbs only. Open by attacking \
         weakness directly.",
    ),
    (
        "viral_bro",
        "The Growth Hacker",
        "ROI-focused thread writer.",
        "Write as a top creator who lives on metrics. Lead with specific numbers. \
         One line per paragraph. Use visual structure. Open with result, timeframe \
         and promise.",
    ),
];
