//! Internal execution trace
//!
//! Everything the turn controller does is reported as a `TraceItem`. The
//! normalizer decides which of these the client gets to see.

use crate::conversation::{AssistantMessage, ToolResultMessage};

#[derive(Debug, Clone, PartialEq)]
pub enum TraceItem {
    /// Session resolved before the first model call
    SessionResolved { session_id: String, is_new: bool },

    /// Streamed fragment of the current assistant message
    AssistantChunk(AssistantMessage),

    /// A tool finished and its result was appended
    ToolResult(ToolResultMessage),

    /// State machine moved between states
    Transition {
        from: &'static str,
        to: &'static str,
    },

    /// The model produced its final answer
    Finished,

    /// The run was aborted
    Failed { message: String },
}
