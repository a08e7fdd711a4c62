//! Web search provider abstraction
//!
//! A search provider maps a query to an ordered list of ranked hits. The
//! production implementation talks to the Tavily search API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search provider is not configured: {0}")]
    NotConfigured(String),
    #[error("search request failed: {0}")]
    Request(String),
    #[error("search provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode search response: {0}")]
    Decode(String),
}

/// Query → ordered hits
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Tavily search client
pub struct TavilyClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl TavilyClient {
    pub fn new(api_key: Option<String>) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SearchError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: TAVILY_BASE_URL.to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SearchError::NotConfigured("TAVILY_API_KEY is not set".to_string()))?;

        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&TavilyRequest { query, max_results })
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        tracing::debug!(query, hits = body.results.len(), "Tavily search completed");

        Ok(body.results.into_iter().map(SearchHit::from).collect())
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl From<TavilyResult> for SearchHit {
    fn from(result: TavilyResult) -> Self {
        Self {
            title: result.title,
            url: result.url,
            snippet: result.content,
        }
    }
}
