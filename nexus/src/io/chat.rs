//! OpenAI-compatible chat backend for the writer, plus the LLM judge that
//! turns reviewer completions into scores and the analyzer that turns topics
//! into intent and keywords.

use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use jsonschema::Draft;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::io::collaborator::{
    CollaboratorError, Evaluation, EvaluationRequest, Evaluator, GenerationRequest,
    GenerationRole, Generator, IntentAnalyzer, is_transient_status,
};
use crate::core::intent::{ContentIntent, parse_intent};
use crate::core::types::Platform;
use crate::io::config::GenerationConfig;
use crate::io::prompt::PromptBuilder;

const VERDICT_SCHEMA: &str = include_str!("../../schemas/review_verdict.schema.json");

const JUDGE_SYSTEM: &str = "You are a demanding content editor. \
Judge drafts only on creative impact and persona alignment. \
Formatting rules are checked elsewhere. Reply with JSON only.";

const ANALYST_SYSTEM: &str = "You are an SEO strategist and content analyst. Reply with JSON only.";

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:TOTAL[_\s])?SCORE[:\s]*(\d+(?:\.\d+)?)\s*/?\s*10").unwrap()
});

static FEEDBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)SPECIFIC[_\s]+(?:IMPROVEMENT|FIX)[^:]*:\s*(.+?)(?:\n\s*\n|$)").unwrap()
});

#[derive(Debug, Clone, PartialEq)]
struct ModelSettings {
    model: String,
    temperature: f32,
}

/// [`Generator`] backed by a `/chat/completions` endpoint.
pub struct ChatGenerator {
    client: Client,
    completions_url: String,
    api_key: String,
    writer: ModelSettings,
    reviewer: ModelSettings,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatGenerator {
    pub fn new(cfg: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder().build().context("build chat http client")?;
        Ok(Self {
            client,
            completions_url: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            writer: ModelSettings {
                model: cfg.writer_model.clone(),
                temperature: cfg.writer_temperature,
            },
            reviewer: ModelSettings {
                model: cfg.reviewer_model.clone(),
                temperature: cfg.reviewer_temperature,
            },
            max_tokens: cfg.max_tokens,
        })
    }

    /// Build from config, reading the API key from the configured env var.
    pub fn from_config(cfg: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .with_context(|| format!("generation API key not set (env {})", cfg.api_key_env))?;
        Self::new(cfg, api_key)
    }

    fn settings(&self, role: GenerationRole) -> &ModelSettings {
        match role {
            GenerationRole::Writer => &self.writer,
            GenerationRole::Reviewer | GenerationRole::Analyst => &self.reviewer,
        }
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    #[instrument(skip_all, fields(role = ?request.role))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String, CollaboratorError> {
        let settings = self.settings(request.role);
        let body = ChatRequest {
            model: &settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: settings.temperature,
            max_tokens: self.max_tokens,
            response_format: request.json_response.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| CollaboratorError::transient(format!("chat request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("chat API returned {status}: {}", text.trim());
            return Err(if is_transient_status(status.as_u16()) {
                CollaboratorError::transient(message)
            } else {
                CollaboratorError::permanent(message)
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|err| {
            CollaboratorError::permanent(format!("decode chat response: {err}"))
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CollaboratorError::transient("chat response had no content"))?;
        debug!(bytes = content.len(), model = %settings.model, "completion received");
        Ok(content)
    }
}

/// [`Evaluator`] that asks a [`Generator`] to judge the draft.
pub struct LlmJudge {
    generator: Arc<dyn Generator>,
    prompts: PromptBuilder,
}

impl LlmJudge {
    pub fn new(generator: Arc<dyn Generator>, prompts: PromptBuilder) -> Self {
        Self { generator, prompts }
    }
}

#[async_trait]
impl Evaluator for LlmJudge {
    async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<Evaluation, CollaboratorError> {
        let prompt = self
            .prompts
            .build_reviewer(request)
            .map_err(|err| CollaboratorError::permanent(format!("render reviewer prompt: {err}")))?;
        let raw = self
            .generator
            .generate(&GenerationRequest {
                role: GenerationRole::Reviewer,
                system: JUDGE_SYSTEM.to_string(),
                prompt,
                json_response: true,
            })
            .await?;
        parse_verdict(&raw)
    }
}

/// [`IntentAnalyzer`] that asks a [`Generator`] to classify the topic.
pub struct LlmIntentAnalyzer {
    generator: Arc<dyn Generator>,
    prompts: PromptBuilder,
}

impl LlmIntentAnalyzer {
    pub fn new(generator: Arc<dyn Generator>, prompts: PromptBuilder) -> Self {
        Self { generator, prompts }
    }
}

#[async_trait]
impl IntentAnalyzer for LlmIntentAnalyzer {
    async fn analyze(
        &self,
        topic: &str,
        platform: Platform,
    ) -> Result<ContentIntent, CollaboratorError> {
        let prompt = self
            .prompts
            .build_intent(topic, platform)
            .map_err(|err| CollaboratorError::permanent(format!("render intent prompt: {err}")))?;
        let raw = self
            .generator
            .generate(&GenerationRequest {
                role: GenerationRole::Analyst,
                system: ANALYST_SYSTEM.to_string(),
                prompt,
                json_response: true,
            })
            .await?;
        let intent = parse_intent(&raw, topic);
        debug!(
            intent = %intent.primary_intent,
            keyword = %intent.primary_keyword,
            "topic analyzed"
        );
        Ok(intent)
    }
}

/// Parse a judge completion.
///
/// Accepts a JSON verdict (optionally fenced or wrapped in prose) and falls
/// back to a `SCORE: n/10` line for models that ignore the JSON instruction.
/// A reply with neither is an [`CollaboratorError::unparseable`] error that
/// carries the raw text.
pub fn parse_verdict(raw: &str) -> Result<Evaluation, CollaboratorError> {
    let schema_errors = match json_object(raw) {
        Some(value) => match check_schema(&value) {
            Ok(()) => {
                return serde_json::from_value(value).map_err(|err| {
                    CollaboratorError::permanent(format!("decode review verdict: {err}"))
                });
            }
            Err(messages) => Some(messages),
        },
        None => None,
    };

    if let Some(score) = SCORE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
    {
        let feedback = FEEDBACK_RE
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map_or_else(|| raw.trim().to_string(), |m| m.as_str().trim().to_string());
        return Ok(Evaluation { score, feedback });
    }

    let message = match schema_errors {
        Some(messages) => format!("review verdict failed validation: {messages}"),
        None => "review verdict had no score".to_string(),
    };
    Err(CollaboratorError::unparseable(message, raw.trim()))
}

fn json_object(raw: &str) -> Option<Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

fn check_schema(instance: &Value) -> Result<(), String> {
    let schema: Value = serde_json::from_str(VERDICT_SCHEMA)
        .map_err(|err| format!("invalid verdict schema: {err}"))?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| format!("compile verdict schema: {err}"))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(messages.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PersonaProfile, Platform};
    use std::sync::Mutex;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> GenerationConfig {
        GenerationConfig {
            base_url: base_url.to_string(),
            ..GenerationConfig::default()
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn writer_request_uses_writer_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer gsk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.3-70b-versatile",
                "messages": [
                    {"role": "system", "content": "voice"},
                    {"role": "user", "content": "write it"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("A draft.")))
            .mount(&server)
            .await;

        let generator = ChatGenerator::new(&config(&server.uri()), "gsk-test").expect("client");
        let text = generator
            .generate(&GenerationRequest {
                role: GenerationRole::Writer,
                system: "voice".to_string(),
                prompt: "write it".to_string(),
                json_response: false,
            })
            .await
            .expect("generate");
        assert_eq!(text, "A draft.");
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let generator = ChatGenerator::new(&config(&server.uri()), "k").expect("client");
        let err = generator
            .generate(&GenerationRequest {
                role: GenerationRole::Reviewer,
                system: String::new(),
                prompt: "judge".to_string(),
                json_response: true,
            })
            .await
            .unwrap_err();
        assert!(err.transient);
        assert!(err.message.contains("overloaded"));
    }

    #[test]
    fn parses_json_verdict() {
        let verdict = parse_verdict(r#"{"score": 7.5, "feedback": "Sharper hook."}"#)
            .expect("verdict");
        assert_eq!(verdict.score, 7.5);
        assert_eq!(verdict.feedback, "Sharper hook.");
    }

    #[test]
    fn parses_fenced_json_verdict() {
        let raw = "```json\n{\"score\": 9, \"feedback\": \"Ship it.\"}\n```";
        let verdict = parse_verdict(raw).expect("verdict");
        assert_eq!(verdict.score, 9.0);
    }

    /// Verifies the plain-text fallback used when the model ignores the JSON contract.
    #[test]
    fn falls_back_to_score_line() {
        let raw = "TOTAL_SCORE: 6.5/10\n\nSPECIFIC_IMPROVEMENTS: Cut the intro.\nAdd a number.\n\nDone.";
        let verdict = parse_verdict(raw).expect("verdict");
        assert_eq!(verdict.score, 6.5);
        assert_eq!(verdict.feedback, "Cut the intro.\nAdd a number.");
    }

    #[test]
    fn rejects_verdict_without_score() {
        let err = parse_verdict(r#"{"feedback": "no score"}"#).unwrap_err();
        assert!(err.transient);
        assert!(err.message.contains("failed validation"));

        let err = parse_verdict("  looks fine to me\n").unwrap_err();
        assert!(err.transient);
        assert!(err.message.contains("no score"));
        assert_eq!(err.reply.as_deref(), Some("looks fine to me"));
    }

    struct CannedGenerator {
        reply: String,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl Generator for CannedGenerator {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<String, CollaboratorError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn judge_sends_reviewer_prompt() {
        let generator = Arc::new(CannedGenerator {
            reply: r#"{"score": 8, "feedback": "Good."}"#.to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let judge = LlmJudge::new(generator.clone(), PromptBuilder::new(12_000).expect("prompts"));
        let verdict = judge
            .evaluate(&EvaluationRequest {
                draft: "Remote work wins.".to_string(),
                persona: PersonaProfile {
                    id: "jobs".to_string(),
                    name: "Jobs".to_string(),
                    description: "Minimalist".to_string(),
                    voice: "Simple and bold.".to_string(),
                },
                platform: Platform::Linkedin,
                topic: "remote work".to_string(),
                iteration: 0,
                banned_hits: Vec::new(),
            })
            .await
            .expect("evaluate");
        assert_eq!(verdict.score, 8.0);

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].role, GenerationRole::Reviewer);
        assert!(seen[0].json_response);
        assert!(seen[0].prompt.contains("Remote work wins."));
    }

    #[tokio::test]
    async fn analyzer_parses_keyword_with_reviewer_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.1-8b-instant",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"{"primary_intent": "guide", "confidence": "high", "primary_keyword": "remote teams"}"#,
            )))
            .mount(&server)
            .await;

        let generator = Arc::new(ChatGenerator::new(&config(&server.uri()), "k").expect("client"));
        let analyzer =
            LlmIntentAnalyzer::new(generator, PromptBuilder::new(12_000).expect("prompts"));
        let intent = analyzer
            .analyze("Leading remote teams", Platform::Blog)
            .await
            .expect("analyze");
        assert_eq!(intent.primary_intent, "guide");
        assert_eq!(intent.primary_keyword, "remote teams");
    }
}
