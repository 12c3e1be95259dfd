//! Web search collaborator
//!
//! Turns a user query into a block of snippet text that the prompt
//! assembler prepends before the user's own message. Search failures are
//! never fatal for a turn: the orchestrator degrades to `[user][files]`
//! and surfaces a warning.

use crate::error::{ChatgateError, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Search provider contract
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Resolve a query to snippet text
    ///
    /// # Errors
    ///
    /// Returns `ChatgateError::SearchUnavailable` on any failure; callers
    /// treat this as a degradation signal, not a turn abort.
    async fn search(&self, query: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
    snippet: String,
    #[serde(default)]
    url: Option<String>,
}

/// HTTP JSON search implementation
///
/// Posts `{"query": ...}` to the configured endpoint with a bearer key
/// and formats the returned hits into a numbered snippet block.
pub struct HttpSearchProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpSearchProvider {
    /// Create a new search provider
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for HttpSearchProvider {
    async fn search(&self, query: &str) -> Result<String> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| ChatgateError::SearchUnavailable(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(
                ChatgateError::SearchUnavailable(format!("search endpoint HTTP {}", status))
                    .into(),
            );
        }

        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| ChatgateError::SearchUnavailable(format!("bad response: {}", e)))?;

        if parsed.results.is_empty() {
            return Err(ChatgateError::SearchUnavailable("no results".to_string()).into());
        }

        Ok(format_hits(&parsed.results))
    }
}

fn format_hits(hits: &[SearchHit]) -> String {
    let mut block = String::from("Web search results:");
    for (i, hit) in hits.iter().enumerate() {
        block.push('\n');
        match &hit.url {
            Some(url) => {
                block.push_str(&format!("{}. {} - {} ({})", i + 1, hit.title, hit.snippet, url))
            }
            None => block.push_str(&format!("{}. {} - {}", i + 1, hit.title, hit.snippet)),
        }
    }
    block
}
