//! Search Chat - streaming chat with web search
//!
//! Answers each message with a model that may call a web search tool, and
//! streams the answer, search activity and sources as server-sent events.

mod api;
mod config;
mod conversation;
mod llm;
mod normalizer;
mod runtime;
mod search;
mod state_machine;
mod tools;

use api::{cors_layer, create_router, AppState};
use config::Config;
use conversation::ConversationStore;
use llm::{GeminiService, LlmService, LoggingService};
use runtime::{ChatRuntime, ModelSettings, RuntimeSettings, ServiceLlmClient};
use search::TavilyClient;
use std::sync::Arc;
use tools::{ToolRegistry, WebSearchTool, WEB_SEARCH_TOOL};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "search_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env()?;

    if config.google_api_key.is_none() {
        tracing::warn!("No model API key configured. Set GOOGLE_API_KEY or GEMINI_API_KEY.");
    }
    if config.tavily_api_key.is_none() {
        tracing::warn!("No search API key configured. Set TAVILY_API_KEY.");
    }

    // Model
    let gemini = GeminiService::new(config.google_api_key.clone(), config.model.clone())?;
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(gemini)));

    // Tools
    let search = TavilyClient::new(config.tavily_api_key.clone())?;
    let tools = ToolRegistry::new().register(Arc::new(WebSearchTool::new(
        Arc::new(search),
        config.search_max_results,
    )));

    // Create application state
    let store = Arc::new(ConversationStore::new());
    let runtime = ChatRuntime::new(
        store.clone(),
        Arc::new(ServiceLlmClient::new(llm)),
        Arc::new(tools),
        RuntimeSettings {
            search_tool: WEB_SEARCH_TOOL.to_string(),
            model: ModelSettings {
                system_prompt: config.system_prompt.clone(),
                temperature: Some(config.temperature),
                max_tokens: config.max_output_tokens,
            },
            max_steps: config.max_steps,
            tool_failure_policy: config.tool_failure_policy,
            ..RuntimeSettings::default()
        },
    );
    tracing::info!(
        model = %runtime.model_id(),
        temperature = config.temperature,
        max_steps = config.max_steps,
        tool_failure_policy = ?config.tool_failure_policy,
        "Chat runtime initialized"
    );
    let state = AppState::new(Arc::new(runtime));

    // Create router
    let app = create_router(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.addr();
    tracing::info!("Search chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.clear().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT - shutting down"),
        () = terminate => tracing::info!("Received SIGTERM - shutting down"),
    }
}
