//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the controller with mock implementations.

use crate::conversation::{ToolCall, ToolResultMessage};
use crate::llm::{ChunkStream, LlmError, LlmRequest, LlmService, ToolDefinition};
use crate::tools::{ToolContext, ToolError, ToolRegistry};
use async_trait::async_trait;
use std::sync::Arc;

/// Client for streaming model responses
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn stream(&self, request: &LlmRequest) -> Result<ChunkStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Executor for tool calls
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run one call, producing its result message
    async fn invoke(
        &self,
        call: &ToolCall,
        ctx: ToolContext,
    ) -> Result<ToolResultMessage, ToolError>;

    /// Get tool definitions for LLM
    fn definitions(&self) -> Vec<ToolDefinition>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn stream(&self, request: &LlmRequest) -> Result<ChunkStream, LlmError> {
        (**self).stream(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn invoke(
        &self,
        call: &ToolCall,
        ctx: ToolContext,
    ) -> Result<ToolResultMessage, ToolError> {
        (**self).invoke(call, ctx).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        (**self).definitions()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use an `LlmService` as `LlmClient`
#[derive(Clone)]
pub struct ServiceLlmClient {
    service: Arc<dyn LlmService>,
}

impl ServiceLlmClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LlmClient for ServiceLlmClient {
    async fn stream(&self, request: &LlmRequest) -> Result<ChunkStream, LlmError> {
        self.service.stream(request).await
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn invoke(
        &self,
        call: &ToolCall,
        ctx: ToolContext,
    ) -> Result<ToolResultMessage, ToolError> {
        ToolRegistry::invoke(self, call, ctx).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        ToolRegistry::definitions(self)
    }
}
