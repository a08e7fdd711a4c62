//! Wire protocol for the chat stream
//!
//! The only vocabulary clients ever see. Each event is written as one
//! `data: <json>` server-sent event.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    /// Id of a freshly created session; send it back to continue
    Checkpoint { checkpoint_id: String },
    SearchStart { query: String },
    Content { content: String },
    SearchResults { urls: Vec<String> },
    End,
}

impl WireEvent {
    /// JSON payload for the `data:` field
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
