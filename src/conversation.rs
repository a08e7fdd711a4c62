//! In-memory conversation store
//!
//! Maps session ids to their accumulated message history. Process-local:
//! nothing survives a restart and there is no eviction.

mod message;

pub use message::{AssistantMessage, Message, ToolCall, ToolResultMessage};

use std::collections::HashMap;
use tokio::sync::RwLock;

/// A resolved session with a snapshot of its history
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    /// True when the id was generated for this request
    pub is_new: bool,
    pub history: Vec<Message>,
}

/// Session id → ordered history
#[derive(Default)]
pub struct ConversationStore {
    sessions: RwLock<HashMap<String, Vec<Message>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a session, creating it when needed.
    ///
    /// `None` generates a fresh id. A supplied id that is not known yet is
    /// adopted as-is with an empty history.
    pub async fn get_or_create(&self, id: Option<&str>) -> Session {
        let Some(id) = id else {
            let id = uuid::Uuid::new_v4().to_string();
            self.sessions.write().await.insert(id.clone(), Vec::new());
            tracing::debug!(session_id = %id, "Created session");
            return Session {
                id,
                is_new: true,
                history: Vec::new(),
            };
        };

        let mut sessions = self.sessions.write().await;
        let history = sessions.entry(id.to_string()).or_default().clone();
        Session {
            id: id.to_string(),
            is_new: false,
            history,
        }
    }

    /// Append messages to a session history
    pub async fn append(&self, session_id: &str, messages: impl IntoIterator<Item = Message>) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .extend(messages);
    }

    /// Snapshot of a session history (empty for unknown ids)
    pub async fn history(&self, session_id: &str) -> Vec<Message> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop every session (shutdown)
    pub async fn clear(&self) {
        let mut sessions = self.sessions.write().await;
        tracing::info!(sessions = sessions.len(), "Clearing conversation store");
        sessions.clear();
    }
}
