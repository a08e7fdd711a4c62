//! Pure state transition function
//!
//! Given the same inputs it always produces the same outputs, with no I/O.

use super::{Effect, Event, TurnContext, TurnState};
use crate::conversation::{Message, ToolCall, ToolResultMessage};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("Run already finished in state {0}")]
    Terminal(&'static str),
    #[error("Event {event} is not valid in state {state}")]
    UnexpectedEvent {
        state: &'static str,
        event: &'static str,
    },
    #[error("Tool result {0} does not answer a pending tool call")]
    UnknownToolResult(String),
}

/// Entry point for a request: record the user message and ask the model
pub fn begin(text: &str) -> TransitionResult {
    TransitionResult::new(TurnState::default())
        .with_effect(Effect::append(Message::user(text)))
        .with_effect(Effect::RequestModel)
}

pub fn transition(
    state: &TurnState,
    context: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        (TurnState::Done | TurnState::Failed { .. }, _) => Err(TransitionError::Terminal(state.name())),

        // ModelTurn + final answer -> Done
        (TurnState::ModelTurn { .. }, Event::ModelResponded { message })
            if !message.has_tool_calls() =>
        {
            Ok(TransitionResult::new(TurnState::Done)
                .with_effect(Effect::append(message))
                .with_effect(Effect::Finish))
        }

        // ModelTurn + tool calls -> ToolTurn
        (TurnState::ModelTurn { step }, Event::ModelResponded { message }) => {
            let next_step = step + 1;
            let pending = message.tool_calls.clone();
            let result = TransitionResult::new(TurnState::ToolTurn {
                pending: pending.clone(),
                step: next_step,
            })
            .with_effect(Effect::append(message));

            if next_step > context.max_steps {
                return Ok(step_limit(result, context));
            }
            Ok(result.with_effect(Effect::InvokeTools(pending)))
        }

        // ModelTurn + failure -> Failed
        (TurnState::ModelTurn { .. }, Event::ModelFailed { message }) => {
            Ok(TransitionResult::new(TurnState::Failed {
                message: message.clone(),
            })
            .with_effect(Effect::Abort { message }))
        }

        // ToolTurn + results -> ModelTurn
        (TurnState::ToolTurn { pending, step }, Event::ToolsCompleted { results }) => {
            if let Some(stray) = results
                .iter()
                .find(|r| !pending.iter().any(|call| call.id == r.tool_call_id))
            {
                return Err(TransitionError::UnknownToolResult(stray.tool_call_id.clone()));
            }

            let next_step = step + 1;
            let mut result = TransitionResult::new(TurnState::ModelTurn { step: next_step });
            if !results.is_empty() {
                result = result.with_effect(Effect::AppendMessages(
                    results.into_iter().map(Message::from).collect(),
                ));
            }

            if next_step > context.max_steps {
                return Ok(step_limit(result, context));
            }
            Ok(result.with_effect(Effect::RequestModel))
        }

        (state, event) => Err(TransitionError::UnexpectedEvent {
            state: state.name(),
            event: event.name(),
        }),
    }
}

/// Replace the next state with `Failed`, keeping already-queued appends
fn step_limit(result: TransitionResult, context: &TurnContext) -> TransitionResult {
    let message = format!(
        "Step limit of {} reached without a final answer",
        context.max_steps
    );
    TransitionResult {
        new_state: TurnState::Failed {
            message: message.clone(),
        },
        effects: result.effects,
    }
    .with_effect(Effect::Abort { message })
}

/// Ids of `pending` calls not answered by `results`
pub fn unanswered<'a>(pending: &'a [ToolCall], results: &[ToolResultMessage]) -> Vec<&'a str> {
    pending
        .iter()
        .filter(|call| !results.iter().any(|r| r.tool_call_id == call.id))
        .map(|call| call.id.as_str())
        .collect()
}
