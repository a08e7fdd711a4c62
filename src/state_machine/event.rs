//! Events that drive the turn state machine

use crate::conversation::{AssistantMessage, ToolResultMessage};

/// Outcomes of the I/O the runtime performed for an effect
#[derive(Debug, Clone)]
pub enum Event {
    /// The model finished streaming one assistant message
    ModelResponded { message: AssistantMessage },

    /// The model call failed; fatal for the request
    ModelFailed { message: String },

    /// Every pending tool call was attempted.
    ///
    /// Results may be fewer than the calls when failures are dropped.
    ToolsCompleted { results: Vec<ToolResultMessage> },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ModelResponded { .. } => "model_responded",
            Event::ModelFailed { .. } => "model_failed",
            Event::ToolsCompleted { .. } => "tools_completed",
        }
    }
}
