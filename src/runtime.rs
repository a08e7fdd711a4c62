//! Runtime for executing chat requests
//!
//! Each request gets its own turn controller and normalizer, connected by a
//! bounded trace channel. The wire stream returned to the caller owns a
//! drop guard: dropping it cancels the run.

mod controller;
mod trace;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use controller::{ModelSettings, ToolFailurePolicy, TurnController, TurnError};
pub use trace::TraceItem;
pub use traits::*;

use crate::conversation::ConversationStore;
use crate::normalizer::{EventNormalizer, WireEvent};
use crate::state_machine::state::DEFAULT_MAX_STEPS;
use crate::state_machine::TurnContext;
use crate::tools::{ToolRegistry, WEB_SEARCH_TOOL};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = ChatRuntime<ServiceLlmClient, ToolRegistry>;

/// Per-runtime settings shared by every request
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Tool whose calls and results are surfaced as search events
    pub search_tool: String,
    pub model: ModelSettings,
    pub max_steps: u32,
    pub tool_failure_policy: ToolFailurePolicy,
    /// Capacity of the trace and wire channels
    pub channel_capacity: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            search_tool: WEB_SEARCH_TOOL.to_string(),
            model: ModelSettings::default(),
            max_steps: DEFAULT_MAX_STEPS,
            tool_failure_policy: ToolFailurePolicy::default(),
            channel_capacity: 64,
        }
    }
}

/// Starts runs and hands back their wire streams
pub struct ChatRuntime<L, T>
where
    L: LlmClient + 'static,
    T: ToolExecutor + 'static,
{
    store: Arc<ConversationStore>,
    llm_client: Arc<L>,
    tool_executor: Arc<T>,
    settings: RuntimeSettings,
}

impl<L, T> ChatRuntime<L, T>
where
    L: LlmClient + 'static,
    T: ToolExecutor + 'static,
{
    pub fn new(
        store: Arc<ConversationStore>,
        llm_client: Arc<L>,
        tool_executor: Arc<T>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            store,
            llm_client,
            tool_executor,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn model_id(&self) -> &str {
        self.llm_client.model_id()
    }

    /// Start a run for `message` and return its wire events.
    ///
    /// A missing `checkpoint_id` starts a new session; the first event is
    /// then its `checkpoint`. The stream always ends with one `end`.
    pub async fn stream(&self, message: String, checkpoint_id: Option<String>) -> WireStream {
        let session = self.store.get_or_create(checkpoint_id.as_deref()).await;
        let session_id = session.id.clone();
        let cancel = CancellationToken::new();

        let capacity = self.settings.channel_capacity.max(1);
        let (trace_tx, trace_rx) = mpsc::channel(capacity);
        let (wire_tx, wire_rx) = mpsc::channel(capacity);

        let controller = TurnController::new(
            TurnContext::new(session_id.clone()).with_max_steps(self.settings.max_steps),
            session,
            self.store.clone(),
            self.llm_client.clone(),
            self.tool_executor.clone(),
            trace_tx,
            cancel.clone(),
        )
        .with_model_settings(self.settings.model.clone())
        .with_failure_policy(self.settings.tool_failure_policy);

        tokio::spawn(async move {
            match controller.run(&message).await {
                Ok(()) => {}
                Err(TurnError::Aborted(reason)) => {
                    tracing::warn!(session_id = %session_id, reason = %reason, "Run ended without an answer");
                }
                Err(TurnError::Cancelled | TurnError::Disconnected) => {
                    tracing::info!(session_id = %session_id, "Client disconnected, run stopped");
                }
                Err(TurnError::Transition(e)) => {
                    tracing::error!(session_id = %session_id, error = %e, "Invalid state transition");
                }
            }
        });

        let normalizer = EventNormalizer::new(self.settings.search_tool.clone());
        tokio::spawn(normalizer.run(trace_rx, wire_tx));

        WireStream {
            inner: ReceiverStream::new(wire_rx),
            _guard: cancel.drop_guard(),
        }
    }
}

/// Wire events of one run; dropping it cancels the run
pub struct WireStream {
    inner: ReceiverStream<WireEvent>,
    _guard: DropGuard,
}

impl Stream for WireStream {
    type Item = WireEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
