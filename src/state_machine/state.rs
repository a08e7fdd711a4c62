//! Turn state types

use crate::conversation::ToolCall;
use serde::Serialize;

/// Graph recursion limit: node executions allowed per request
pub const DEFAULT_MAX_STEPS: u32 = 25;

/// Where a request is in the model/tool cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// Model call in flight
    ModelTurn { step: u32 },

    /// Executing the tool calls of the last assistant message, in order
    ToolTurn { pending: Vec<ToolCall>, step: u32 },

    /// Model answered without tool calls
    Done,

    /// Run aborted; the message says why
    Failed { message: String },
}

impl Default for TurnState {
    fn default() -> Self {
        TurnState::ModelTurn { step: 1 }
    }
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done | TurnState::Failed { .. })
    }

    /// Number of node executions so far (terminal states report 0)
    pub fn step(&self) -> u32 {
        match self {
            TurnState::ModelTurn { step } | TurnState::ToolTurn { step, .. } => *step,
            TurnState::Done | TurnState::Failed { .. } => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TurnState::ModelTurn { .. } => "model_turn",
            TurnState::ToolTurn { .. } => "tool_turn",
            TurnState::Done => "done",
            TurnState::Failed { .. } => "failed",
        }
    }
}

/// Immutable configuration for one request
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_id: String,
    pub max_steps: u32,
}

impl TurnContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }
}
