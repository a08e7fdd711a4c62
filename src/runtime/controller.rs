//! Turn controller
//!
//! Drives the pure state machine for one request: feeds it events, executes
//! the effects it returns, and reports everything it does as trace items.

use super::traits::{LlmClient, ToolExecutor};
use super::TraceItem;
use crate::conversation::{AssistantMessage, ConversationStore, Session, ToolCall, ToolResultMessage};
use crate::llm::{LlmRequest, StreamChunk};
use crate::state_machine::transition::unanswered;
use crate::state_machine::{
    begin, transition, Effect, Event, TransitionError, TransitionResult, TurnContext, TurnState,
};
use crate::tools::ToolContext;
use futures::StreamExt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What to do when a tool call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolFailurePolicy {
    /// Append an error result so every call is answered
    #[default]
    SynthesizeError,
    /// Log and leave the call unanswered
    Drop,
}

impl FromStr for ToolFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synthesize" | "synthesize_error" => Ok(Self::SynthesizeError),
            "drop" => Ok(Self::Drop),
            other => Err(format!("unknown tool failure policy: {other}")),
        }
    }
}

/// Model parameters applied to every request
#[derive(Debug, Clone, Default)]
pub struct ModelSettings {
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("run aborted: {0}")]
    Aborted(String),
    #[error("run cancelled")]
    Cancelled,
    #[error("trace consumer disconnected")]
    Disconnected,
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Runs the model/tool cycle for one request
pub struct TurnController<L, T>
where
    L: LlmClient + 'static,
    T: ToolExecutor + 'static,
{
    context: TurnContext,
    state: TurnState,
    session: Session,
    store: Arc<ConversationStore>,
    llm_client: Arc<L>,
    tool_executor: Arc<T>,
    model: ModelSettings,
    failure_policy: ToolFailurePolicy,
    trace_tx: mpsc::Sender<TraceItem>,
    cancel: CancellationToken,
}

impl<L, T> TurnController<L, T>
where
    L: LlmClient + 'static,
    T: ToolExecutor + 'static,
{
    pub fn new(
        context: TurnContext,
        session: Session,
        store: Arc<ConversationStore>,
        llm_client: Arc<L>,
        tool_executor: Arc<T>,
        trace_tx: mpsc::Sender<TraceItem>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            context,
            state: TurnState::default(),
            session,
            store,
            llm_client,
            tool_executor,
            model: ModelSettings::default(),
            failure_policy: ToolFailurePolicy::default(),
            trace_tx,
            cancel,
        }
    }

    pub fn with_model_settings(mut self, model: ModelSettings) -> Self {
        self.model = model;
        self
    }

    pub fn with_failure_policy(mut self, policy: ToolFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Run until the model answers, the run fails, or the client goes away
    pub async fn run(mut self, text: &str) -> Result<(), TurnError> {
        tracing::info!(
            session_id = %self.context.session_id,
            is_new = self.session.is_new,
            history = self.session.history.len(),
            "Starting turn controller"
        );

        self.emit(TraceItem::SessionResolved {
            session_id: self.session.id.clone(),
            is_new: self.session.is_new,
        })
        .await?;

        let mut next = self.apply(begin(text)).await?;
        while let Some(event) = next {
            let result = transition(&self.state, &self.context, event)?;
            next = self.apply(result).await?;
        }

        match &self.state {
            TurnState::Failed { message } => Err(TurnError::Aborted(message.clone())),
            _ => {
                tracing::info!(session_id = %self.context.session_id, "Turn controller finished");
                Ok(())
            }
        }
    }

    /// Enter the new state and execute its effects.
    ///
    /// Returns the event produced by the effects, if any.
    async fn apply(&mut self, result: TransitionResult) -> Result<Option<Event>, TurnError> {
        let old_state = std::mem::replace(&mut self.state, result.new_state);
        if old_state.name() != self.state.name() {
            tracing::debug!(
                session_id = %self.context.session_id,
                from = old_state.name(),
                to = self.state.name(),
                step = self.state.step(),
                "State transition"
            );
            self.emit(TraceItem::Transition {
                from: old_state.name(),
                to: self.state.name(),
            })
            .await?;
        }

        let mut generated = None;
        for effect in result.effects {
            if let Some(event) = self.execute_effect(effect).await? {
                generated = Some(event);
            }
        }
        Ok(generated)
    }

    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, TurnError> {
        match effect {
            Effect::AppendMessages(messages) => {
                self.store
                    .append(&self.session.id, messages.iter().cloned())
                    .await;
                self.session.history.extend(messages);
                Ok(None)
            }
            Effect::RequestModel => self.request_model().await.map(Some),
            Effect::InvokeTools(calls) => self.invoke_tools(calls).await.map(Some),
            Effect::Finish => {
                self.emit(TraceItem::Finished).await?;
                Ok(None)
            }
            Effect::Abort { message } => {
                tracing::error!(session_id = %self.context.session_id, error = %message, "Run aborted");
                self.emit(TraceItem::Failed { message }).await?;
                Ok(None)
            }
        }
    }

    /// Stream one model response, forwarding each fragment as it arrives
    async fn request_model(&mut self) -> Result<Event, TurnError> {
        let mut request =
            LlmRequest::new(self.session.history.clone(), self.tool_executor.definitions())
                .with_temperature(self.model.temperature)
                .with_max_tokens(self.model.max_tokens);
        request.system.clone_from(&self.model.system_prompt);

        let opened = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(TurnError::Cancelled),
            opened = self.llm_client.stream(&request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return Ok(Event::ModelFailed { message: e.to_string() }),
        };

        let mut message = AssistantMessage::default();
        // Tool calls form one directive at the end of the response
        let mut directive = AssistantMessage::default();
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(TurnError::Cancelled),
                next = stream.next() => next,
            };

            match next {
                None => break,
                Some(Ok(StreamChunk::Text(text))) => {
                    let chunk = AssistantMessage::text(text);
                    self.emit(TraceItem::AssistantChunk(chunk.clone())).await?;
                    message.absorb(chunk);
                }
                Some(Ok(StreamChunk::ToolUse(call))) => directive.tool_calls.push(call),
                Some(Ok(StreamChunk::Usage(_))) => {}
                Some(Err(e)) => return Ok(Event::ModelFailed { message: e.to_string() }),
            }
        }

        if directive.has_tool_calls() {
            self.emit(TraceItem::AssistantChunk(directive.clone())).await?;
            message.absorb(directive);
        }

        Ok(Event::ModelResponded { message })
    }

    /// Invoke each call in order; failures follow the failure policy
    async fn invoke_tools(&mut self, calls: Vec<ToolCall>) -> Result<Event, TurnError> {
        let mut results = Vec::with_capacity(calls.len());

        for call in &calls {
            let ctx = ToolContext::new(self.cancel.child_token(), self.session.id.clone());
            let result = match self.tool_executor.invoke(call, ctx).await {
                Ok(result) => result,
                Err(_) if self.cancel.is_cancelled() => return Err(TurnError::Cancelled),
                Err(e) => {
                    tracing::error!(
                        session_id = %self.context.session_id,
                        tool = %call.name,
                        tool_call_id = %call.id,
                        error = %e,
                        "Tool failed"
                    );
                    match self.failure_policy {
                        ToolFailurePolicy::SynthesizeError => {
                            ToolResultMessage::error(call, &e.to_string())
                        }
                        ToolFailurePolicy::Drop => continue,
                    }
                }
            };
            self.emit(TraceItem::ToolResult(result.clone())).await?;
            results.push(result);
        }

        let missing = unanswered(&calls, &results);
        if !missing.is_empty() {
            tracing::warn!(
                session_id = %self.context.session_id,
                unanswered = ?missing,
                "Continuing with unanswered tool calls"
            );
        }

        Ok(Event::ToolsCompleted { results })
    }

    async fn emit(&self, item: TraceItem) -> Result<(), TurnError> {
        self.trace_tx
            .send(item)
            .await
            .map_err(|_| TurnError::Disconnected)
    }
}
