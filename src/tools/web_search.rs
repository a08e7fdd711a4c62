//! Web search tool - lets the model look up current information

use super::{Tool, ToolContext, ToolError};
use crate::search::SearchProvider;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const WEB_SEARCH_TOOL: &str = "web_search";

#[derive(Debug, Deserialize)]
struct WebSearchInput {
    query: String,
}

/// Search tool backed by a `SearchProvider`
pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            provider,
            max_results,
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        WEB_SEARCH_TOOL
    }

    fn description(&self) -> String {
        "A search engine optimized for comprehensive, accurate, and trusted results. Useful for when you need to answer questions about current events. Input should be a search query.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "search query to look up"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: WebSearchInput =
            serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

        tracing::info!(session_id = %ctx.session_id, query = %input.query, "Running web search");

        let hits = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
            result = self.provider.search(&input.query, self.max_results) => {
                result.map_err(|e| ToolError::Execution(e.to_string()))?
            }
        };

        serde_json::to_string(&hits).map_err(|e| ToolError::Execution(e.to_string()))
    }
}
