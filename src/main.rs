use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use tomi_backend::config::AppConfig;
use tomi_backend::models::{ChatRequest, ChatResponse, IndexStatusResponse, RootResponse};
use tomi_backend::rag::RagService;

const ALLOWED_ORIGINS: [&str; 6] = [
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost",
    "http://localhost:80",
    "http://127.0.0.1",
    "http://127.0.0.1:80",
];

struct AppState {
    rag: RagService,
    config: AppConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Provider: {}", config.provider);
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Index directory: {}", config.index_dir().display());

    let rag = RagService::from_config(&config)?;
    let state = Arc::new(AppState { rag, config });

    // Ingestion runs once; chat requests get the not-initialized answer until it finishes.
    let ingest_state = Arc::clone(&state);
    tokio::spawn(async move {
        let dir = ingest_state.config.data_dir.clone();
        ingest_state.rag.ingest(&dir).await;
    });

    let cors = CorsLayer::new()
        .allow_origin(ALLOWED_ORIGINS.map(HeaderValue::from_static))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/status", get(status_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    tracing::info!("Tomi backend listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok".to_string(),
        message: "Tomi Chatbot API is running".to_string(),
    })
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let request_id = Uuid::new_v4();
    tracing::info!(
        "Chat request {} (subject: {})",
        request_id,
        request.subject.as_deref().unwrap_or("-")
    );

    let response = state.rag.answer(&request.message).await;

    tracing::info!("Chat request {} answered ({} chars)", request_id, response.len());
    Json(ChatResponse::neutral(response))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<IndexStatusResponse> {
    let status = state.rag.status().await;
    let ready = state.rag.is_ready().await;

    Json(IndexStatusResponse {
        provider: status.provider.to_string(),
        is_indexing: status.is_indexing,
        ready,
        total_files_processed: status.total_files_processed,
        total_entries: status.total_entries,
        ingested_this_run: status.ingested_this_run,
        failed_files: status.failed_files,
        last_indexed_at: status.last_indexed_at,
        last_error: status.last_error,
        data_dir: state.config.data_dir.display().to_string(),
    })
}
