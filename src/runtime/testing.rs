//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::conversation::{ToolCall, ToolResultMessage};
use crate::llm::{ChunkStream, LlmError, LlmRequest, StreamChunk, ToolDefinition};
use crate::tools::{ToolContext, ToolError};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// ============================================================================
// Mock LLM Client
// ============================================================================

enum Scripted {
    /// Stream these items, then either end or hang forever
    Stream {
        items: Vec<Result<StreamChunk, LlmError>>,
        hang: bool,
    },
    /// Fail before any chunk is produced
    OpenError(LlmError),
}

/// Mock LLM client that streams queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Scripted>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, scripted: Scripted) {
        self.responses.lock().unwrap().push_back(scripted);
    }

    /// Queue a response streamed as the given chunks
    pub fn queue_chunks(&self, chunks: Vec<StreamChunk>) {
        self.push(Scripted::Stream {
            items: chunks.into_iter().map(Ok).collect(),
            hang: false,
        });
    }

    /// Queue a plain text answer split into fragments
    pub fn queue_text(&self, fragments: &[&str]) {
        self.queue_chunks(
            fragments
                .iter()
                .map(|f| StreamChunk::Text((*f).to_string()))
                .collect(),
        );
    }

    /// Queue a response consisting only of tool calls
    pub fn queue_tool_calls(&self, calls: Vec<ToolCall>) {
        self.queue_chunks(calls.into_iter().map(StreamChunk::ToolUse).collect());
    }

    /// Queue a failure to open the stream
    pub fn queue_error(&self, error: LlmError) {
        self.push(Scripted::OpenError(error));
    }

    /// Queue chunks followed by a mid-stream failure
    pub fn queue_chunks_then_error(&self, chunks: Vec<StreamChunk>, error: LlmError) {
        let mut items: Vec<_> = chunks.into_iter().map(Ok).collect();
        items.push(Err(error));
        self.push(Scripted::Stream { items, hang: false });
    }

    /// Queue chunks after which the stream never completes
    pub fn queue_chunks_then_hang(&self, chunks: Vec<StreamChunk>) {
        self.push(Scripted::Stream {
            items: chunks.into_iter().map(Ok).collect(),
            hang: true,
        });
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn stream(&self, request: &LlmRequest) -> Result<ChunkStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());

        let scripted = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::OpenError(LlmError::network("No mock response queued")));

        match scripted {
            Scripted::OpenError(e) => Err(e),
            Scripted::Stream { items, hang: false } => Ok(futures::stream::iter(items).boxed()),
            Scripted::Stream { items, hang: true } => Ok(futures::stream::iter(items)
                .chain(futures::stream::pending())
                .boxed()),
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

#[derive(Clone)]
enum ToolOutcome {
    Payload(String),
    Failure(String),
}

/// Mock tool executor with predefined outputs
pub struct MockToolExecutor {
    outcomes: HashMap<String, ToolOutcome>,
    definitions: Vec<ToolDefinition>,
    /// Record of tool executions
    pub executions: Mutex<Vec<ToolCall>>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            definitions: Vec::new(),
            executions: Mutex::new(Vec::new()),
        }
    }

    fn define(&mut self, name: &str) {
        self.definitions.push(ToolDefinition {
            name: name.to_string(),
            description: format!("Mock {name}"),
            input_schema: json!({ "type": "object", "properties": {} }),
        });
    }

    /// Add a tool returning a fixed payload
    pub fn with_tool(mut self, name: impl Into<String>, payload: impl Into<String>) -> Self {
        let name = name.into();
        self.define(&name);
        self.outcomes.insert(name, ToolOutcome::Payload(payload.into()));
        self
    }

    /// Add a tool that always fails
    pub fn with_failing_tool(mut self, name: impl Into<String>, error: impl Into<String>) -> Self {
        let name = name.into();
        self.define(&name);
        self.outcomes.insert(name, ToolOutcome::Failure(error.into()));
        self
    }

    /// Get recorded executions
    pub fn recorded_executions(&self) -> Vec<ToolCall> {
        self.executions.lock().unwrap().clone()
    }
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn invoke(
        &self,
        call: &ToolCall,
        _ctx: ToolContext,
    ) -> Result<ToolResultMessage, ToolError> {
        self.executions.lock().unwrap().push(call.clone());
        match self.outcomes.get(&call.name) {
            Some(ToolOutcome::Payload(payload)) => Ok(ToolResultMessage::success(call, payload.clone())),
            Some(ToolOutcome::Failure(error)) => Err(ToolError::Execution(error.clone())),
            None => Err(ToolError::UnknownTool(call.name.clone())),
        }
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// A `web_search` call for `query`
pub fn search_call(id: &str, query: &str) -> ToolCall {
    ToolCall::new(id, crate::tools::WEB_SEARCH_TOOL, json!({ "query": query }))
}

/// Search payload with one record per url
pub fn search_payload(urls: &[&str]) -> String {
    let records: Vec<_> = urls
        .iter()
        .enumerate()
        .map(|(i, url)| json!({ "title": format!("Result {i}"), "url": url, "snippet": "..." }))
        .collect();
    serde_json::Value::Array(records).to_string()
}
