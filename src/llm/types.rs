//! Common types for LLM interactions

use crate::conversation::{Message, ToolCall};
use futures::stream::BoxStream;

use super::LlmError;

/// Streaming completion request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: Option<String>,
    /// Full ordered session history
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(messages: Vec<Message>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            system: None,
            messages,
            tools,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Tool definition declared to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// One increment of a streamed model response
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Partial text
    Text(String),
    /// Complete function-call directive
    ToolUse(ToolCall),
    Usage(Usage),
}

/// Stream of response increments
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, LlmError>>;

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
