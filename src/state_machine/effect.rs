//! Effects produced by state transitions

use crate::conversation::{Message, ToolCall};

/// Work for the runtime to carry out after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append to the session history
    AppendMessages(Vec<Message>),

    /// Stream a model response over the full history
    RequestModel,

    /// Run the tool calls sequentially, in order
    InvokeTools(Vec<ToolCall>),

    /// The model produced its final answer
    Finish,

    /// Stop the run
    Abort { message: String },
}

impl Effect {
    pub fn append(message: impl Into<Message>) -> Self {
        Effect::AppendMessages(vec![message.into()])
    }
}
