//! LLM provider abstraction
//!
//! The model is a black box from ordered history to a streamed response
//! that may end in one or more function-call directives.

mod error;
mod gemini;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::GeminiService;
pub use types::*;

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Open a streaming completion
    async fn stream(&self, request: &LlmRequest) -> Result<ChunkStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn stream(&self, request: &LlmRequest) -> Result<ChunkStream, LlmError> {
        let start = Instant::now();
        let result = self.inner.stream(request).await;

        match result {
            Ok(stream) => {
                tracing::info!(
                    model = %self.model_id,
                    messages = request.messages.len(),
                    duration_ms = %start.elapsed().as_millis(),
                    "LLM stream opened"
                );
                let model_id = self.model_id.clone();
                Ok(stream
                    .inspect(move |item| match item {
                        Ok(StreamChunk::Usage(usage)) => tracing::debug!(
                            model = %model_id,
                            duration_ms = %start.elapsed().as_millis(),
                            input_tokens = usage.input_tokens,
                            output_tokens = usage.output_tokens,
                            "LLM usage reported"
                        ),
                        Ok(_) => {}
                        Err(e) => tracing::error!(
                            model = %model_id,
                            error = %e.message,
                            retryable = e.kind.is_retryable(),
                            "LLM stream failed"
                        ),
                    })
                    .boxed())
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
                Err(e)
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
