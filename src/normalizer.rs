//! Event normalizer
//!
//! Projects the controller's execution trace onto the wire protocol, one
//! trace item at a time and in order. Rules, first match wins:
//!
//! 1. A search tool result becomes `search_results` with its urls; the raw
//!    payload is never shown.
//! 2. An assistant fragment with no text that calls the search tool becomes
//!    `search_start` with the escaped query.
//! 3. An assistant fragment with text becomes `content`.
//! 4. Everything else is skipped.
//!
//! A new session opens with `checkpoint`; the stream always closes with
//! exactly one `end`, whatever happened upstream.

mod wire;

pub use wire::WireEvent;

use crate::conversation::{AssistantMessage, ToolResultMessage};
use crate::runtime::TraceItem;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Search tool payload did not have the expected shape
#[derive(Debug, Error)]
#[error("search results payload is not a JSON array: {0}")]
pub struct ToolResultParseError(String);

/// Maps trace items to wire events
#[derive(Debug, Clone)]
pub struct EventNormalizer {
    search_tool: String,
}

impl EventNormalizer {
    pub fn new(search_tool: impl Into<String>) -> Self {
        Self {
            search_tool: search_tool.into(),
        }
    }

    /// Wire event for one trace item, if it has a visible counterpart
    pub fn normalize(&self, item: &TraceItem) -> Option<WireEvent> {
        match item {
            TraceItem::SessionResolved { session_id, is_new } => {
                is_new.then(|| WireEvent::Checkpoint {
                    checkpoint_id: session_id.clone(),
                })
            }
            TraceItem::ToolResult(result) if result.tool_name == self.search_tool => {
                self.search_results(result)
            }
            TraceItem::AssistantChunk(chunk) => self.assistant_event(chunk),
            TraceItem::ToolResult(_)
            | TraceItem::Transition { .. }
            | TraceItem::Finished
            | TraceItem::Failed { .. } => None,
        }
    }

    fn search_results(&self, result: &ToolResultMessage) -> Option<WireEvent> {
        if result.is_error {
            tracing::warn!(
                tool = %self.search_tool,
                tool_call_id = %result.tool_call_id,
                "Search failed, no results to show"
            );
            return None;
        }

        match extract_urls(&result.payload) {
            Ok(urls) => Some(WireEvent::SearchResults { urls }),
            Err(e) => {
                tracing::error!(
                    tool_call_id = %result.tool_call_id,
                    error = %e,
                    "Dropping unparseable search results"
                );
                None
            }
        }
    }

    fn assistant_event(&self, chunk: &AssistantMessage) -> Option<WireEvent> {
        if chunk.text.is_empty() {
            return chunk
                .tool_calls
                .iter()
                .find(|call| call.name == self.search_tool)
                .map(|call| WireEvent::SearchStart {
                    query: escape_query(call.str_argument("query").unwrap_or_default()),
                });
        }

        Some(WireEvent::Content {
            content: chunk.text.clone(),
        })
    }

    /// Drain `trace_rx` into `wire_tx` until the trace closes, then send `end`.
    ///
    /// Returns early if the consumer goes away.
    pub async fn run(self, mut trace_rx: mpsc::Receiver<TraceItem>, wire_tx: mpsc::Sender<WireEvent>) {
        while let Some(item) = trace_rx.recv().await {
            let Some(event) = self.normalize(&item) else {
                tracing::trace!(?item, "Trace item has no wire event");
                continue;
            };
            if wire_tx.send(event).await.is_err() {
                tracing::debug!("Wire consumer closed, stopping normalizer");
                return;
            }
        }

        let _ = wire_tx.send(WireEvent::End).await;
    }
}

/// Escape double quotes, single quotes and newlines with a backslash
pub fn escape_query(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Every string `url` field of a JSON array of records, in order
pub fn extract_urls(payload: &str) -> Result<Vec<String>, ToolResultParseError> {
    let records: Vec<Value> =
        serde_json::from_str(payload).map_err(|e| ToolResultParseError(e.to_string()))?;

    Ok(records
        .iter()
        .filter_map(|record| record.get("url").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}
