//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{StreamQuery, VersionResponse};
use super::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Streaming chat
        .route("/chat_stream/:message", get(chat_stream))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Streaming Chat
// ============================================================

async fn chat_stream(
    State(state): State<AppState>,
    Path(message): Path<String>,
    Query(query): Query<StreamQuery>,
) -> impl IntoResponse {
    let checkpoint_id = query.checkpoint();
    tracing::info!(
        checkpoint_id = checkpoint_id.as_deref().unwrap_or("<new>"),
        message_len = message.len(),
        "Chat stream requested"
    );

    let events = state.runtime.stream(message, checkpoint_id).await;
    sse_stream(events)
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::cors_layer;
    use crate::conversation::{ConversationStore, ToolCall};
    use crate::llm::{ChunkStream, LlmError, LlmRequest, LlmService, StreamChunk};
    use crate::runtime::{ChatRuntime, RuntimeSettings, ServiceLlmClient};
    use crate::search::{SearchError, SearchHit, SearchProvider};
    use crate::tools::{ToolRegistry, WebSearchTool};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    /// Streams queued chunk lists, one per request
    struct ScriptedService {
        responses: Mutex<VecDeque<Vec<StreamChunk>>>,
    }

    #[async_trait]
    impl LlmService for ScriptedService {
        async fn stream(&self, _request: &LlmRequest) -> Result<ChunkStream, LlmError> {
            let chunks = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::network("no scripted response"))?;
            Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    struct StaticSearch;

    #[async_trait]
    impl SearchProvider for StaticSearch {
        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchHit>, SearchError> {
            Ok(vec![SearchHit {
                title: "News".to_string(),
                url: "https://news.example/ai".to_string(),
                snippet: "AI news".to_string(),
            }])
        }
    }

    fn app(responses: Vec<Vec<StreamChunk>>) -> (Router, Arc<ConversationStore>) {
        let store = Arc::new(ConversationStore::new());
        let service = ScriptedService {
            responses: Mutex::new(responses.into()),
        };
        let tools = ToolRegistry::new().register(Arc::new(WebSearchTool::new(Arc::new(StaticSearch), 5)));
        let runtime = ChatRuntime::new(
            store.clone(),
            Arc::new(ServiceLlmClient::new(Arc::new(service))),
            Arc::new(tools),
            RuntimeSettings::default(),
        );
        let router = create_router(AppState::new(Arc::new(runtime))).layer(cors_layer());
        (router, store)
    }

    async fn events(router: Router, uri: &str) -> Vec<Value> {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec())
            .unwrap()
            .split("\n\n")
            .filter(|frame| !frame.is_empty())
            .map(|frame| {
                let data = frame.strip_prefix("data: ").unwrap();
                serde_json::from_str(data).unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_direct_answer_stream() {
        let (router, store) = app(vec![vec![
            StreamChunk::Text("Sunny ".to_string()),
            StreamChunk::Text("in Paris".to_string()),
        ]]);

        let events = events(router, "/chat_stream/What's%20the%20weather%20in%20Paris%3F").await;

        assert_eq!(events[0]["type"], "checkpoint");
        let id = events[0]["checkpoint_id"].as_str().unwrap().to_string();
        assert_eq!(events[1], json!({"type": "content", "content": "Sunny "}));
        assert_eq!(events[2], json!({"type": "content", "content": "in Paris"}));
        assert_eq!(events[3], json!({"type": "end"}));
        assert_eq!(events.len(), 4);

        let history = store.history(&id).await;
        assert_eq!(
            history[0],
            crate::conversation::Message::user("What's the weather in Paris?")
        );
    }

    #[tokio::test]
    async fn test_search_stream() {
        let (router, _) = app(vec![
            vec![StreamChunk::ToolUse(ToolCall::new(
                "c1",
                "web_search",
                json!({"query": "today's AI news"}),
            ))],
            vec![StreamChunk::Text("Here is the news".to_string())],
        ]);

        let events = events(router, "/chat_stream/search%20for%20today's%20AI%20news").await;

        assert_eq!(events[0]["type"], "checkpoint");
        assert_eq!(
            &events[1..],
            &[
                json!({"type": "search_start", "query": "today\\'s AI news"}),
                json!({"type": "search_results", "urls": ["https://news.example/ai"]}),
                json!({"type": "content", "content": "Here is the news"}),
                json!({"type": "end"}),
            ]
        );
    }

    #[tokio::test]
    async fn test_supplied_checkpoint_has_no_checkpoint_event() {
        let (router, store) = app(vec![vec![StreamChunk::Text("ok".to_string())]]);

        let events = events(router, "/chat_stream/hello?checkpoint_id=abc").await;

        assert_eq!(
            events,
            vec![
                json!({"type": "content", "content": "ok"}),
                json!({"type": "end"})
            ]
        );
        assert_eq!(store.history("abc").await.len(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_still_ends() {
        let (router, _) = app(vec![]);

        let events = events(router, "/chat_stream/hello").await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "checkpoint");
        assert_eq!(events[1], json!({"type": "end"}));
    }

    #[tokio::test]
    async fn test_cors_is_open() {
        let (router, _) = app(vec![vec![StreamChunk::Text("ok".to_string())]]);

        let response = router
            .oneshot(
                Request::get("/chat_stream/hi")
                    .header(header::ORIGIN, "https://client.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_version() {
        let (router, _) = app(vec![]);
        let response = router
            .oneshot(Request::get("/version").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let version: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(version["name"], "search_chat");
        assert_eq!(version["version"], env!("CARGO_PKG_VERSION"));
    }
}
