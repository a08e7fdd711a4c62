//! API request and response types

use serde::{Deserialize, Serialize};

/// Query string of `/chat_stream/:message`
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Session to continue; omitted for a new conversation
    pub checkpoint_id: Option<String>,
}

impl StreamQuery {
    /// The supplied id, treating a blank value as absent
    pub fn checkpoint(self) -> Option<String> {
        self.checkpoint_id.filter(|id| !id.trim().is_empty())
    }
}

/// Response of `/version`
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub name: &'static str,
    pub version: &'static str,
}
