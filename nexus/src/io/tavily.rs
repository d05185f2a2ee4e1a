//! Fact retrieval through the Tavily search API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::types::Fact;
use crate::io::collaborator::{CollaboratorError, FactRetriever, is_transient_status};
use crate::io::config::SearchConfig;

pub struct TavilyRetriever {
    client: Client,
    search_url: String,
    api_key: String,
    depth: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilyRetriever {
    pub fn new(base_url: &str, api_key: impl Into<String>, depth: impl Into<String>) -> Result<Self> {
        let client = Client::builder().build().context("build search http client")?;
        Ok(Self {
            client,
            search_url: format!("{}/search", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            depth: depth.into(),
        })
    }

    /// Build from config, reading the API key from the configured env var.
    pub fn from_config(cfg: &SearchConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .with_context(|| format!("search API key not set (env {})", cfg.api_key_env))?;
        Self::new(&cfg.base_url, api_key, cfg.depth.clone())
    }
}

fn to_fact(result: SearchResult) -> Option<Fact> {
    let content = result.content.trim();
    if content.is_empty() {
        return None;
    }
    let title = result.title.trim();
    let text = if title.is_empty() {
        content.to_string()
    } else {
        format!("{title}: {content}")
    };
    Some(Fact::new(text, result.url.trim()))
}

#[async_trait]
impl FactRetriever for TavilyRetriever {
    #[instrument(skip_all, fields(query = %query, max_results))]
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<Fact>, CollaboratorError> {
        let request = SearchRequest {
            query,
            search_depth: &self.depth,
            max_results,
            include_raw_content: false,
        };
        let response = self
            .client
            .post(&self.search_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| CollaboratorError::transient(format!("search request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("search API returned {status}: {}", body.trim());
            return Err(if is_transient_status(status.as_u16()) {
                CollaboratorError::transient(message)
            } else {
                CollaboratorError::permanent(message)
            });
        }

        let parsed: SearchResponse = response.json().await.map_err(|err| {
            CollaboratorError::permanent(format!("decode search response: {err}"))
        })?;
        let facts: Vec<Fact> = parsed.results.into_iter().filter_map(to_fact).collect();
        debug!(results = facts.len(), "search completed");
        Ok(facts)
    }
}
