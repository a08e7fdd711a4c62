//! Tool invocation
//!
//! Tools are registered by name and dispatched on `ToolCall::name`. A tool
//! either produces a serialized payload or fails with a `ToolError`.

mod web_search;

pub use web_search::{WebSearchTool, WEB_SEARCH_TOOL};

use crate::conversation::{ToolCall, ToolResultMessage};
use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("tool execution failed: {0}")]
    Execution(String),
    #[error("tool execution cancelled")]
    Cancelled,
}

/// Per-call context handed to a tool
#[derive(Clone)]
pub struct ToolContext {
    /// Fires when the requesting client goes away
    pub cancel: CancellationToken,
    pub session_id: String,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken, session_id: impl Into<String>) -> Self {
        Self {
            cancel,
            session_id: session_id.into(),
        }
    }
}

/// Trait for tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool, returning the serialized result payload
    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError>;
}

/// Tools available to conversations, keyed by name
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; a later registration with the same name replaces it
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
        self
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Run the tool named by `call` and wrap its payload as a result message
    pub async fn invoke(
        &self,
        call: &ToolCall,
        ctx: ToolContext,
    ) -> Result<ToolResultMessage, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        let payload = tool.run(call.arguments.clone(), ctx).await?;
        Ok(ToolResultMessage::success(call, payload))
    }
}
