//! HTTP API server.
//!
//! Exposes the session lifecycle over REST: start a conversation, post
//! messages, and poll the results of the background processing.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::AdbriefError;
use crate::session::SessionController;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
struct AppState {
    controller: Arc<SessionController>,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Converse, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'adbrief doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let controller = SessionController::from_settings(&settings)?;
    let app = router(Arc::clone(&controller));

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("adbrief API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Start chat", "POST /chat/start");
    Output::kv("Send message", "POST /chat/message");
    Output::kv("Results", "GET  /results/{session_id}");
    Output::kv("Session", "GET  /sessions/{session_id}");
    Output::kv("List sessions", "GET  /sessions");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Output::info("Waiting for background processing to finish...");
    controller.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Build the API router around a controller.
pub fn router(controller: Arc<SessionController>) -> Router {
    let state = Arc::new(AppState { controller });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/chat/start", post(start_chat))
        .route("/chat/message", post(chat_message))
        .route("/results/{session_id}", get(get_results))
        .route("/sessions", get(list_sessions))
        .route("/sessions/{session_id}", get(get_session))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ChatMessageRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct SessionListResponse {
    sessions: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP status for a library error.
fn status_for(error: &AdbriefError) -> StatusCode {
    match error {
        AdbriefError::UnknownSession(_) => StatusCode::NOT_FOUND,
        AdbriefError::InvalidSessionState(_) | AdbriefError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AdbriefError::Collaborator { retryable: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
        AdbriefError::Collaborator { retryable: false, .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: AdbriefError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        error!("Request failed: {}", error);
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn start_chat(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.controller.start_session().await)
}

async fn chat_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatMessageRequest>,
) -> Response {
    let Some(session_id) = req.session_id.filter(|id| !id.is_empty()) else {
        return error_response(AdbriefError::InvalidInput(
            "session_id is required".to_string(),
        ));
    };

    match state.controller.post_message(&session_id, &req.message).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.controller.get_results(&session_id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.controller.get_session(&session_id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

async fn list_sessions(State(state): State<Arc<AppState>>) -> Response {
    match state.controller.list_sessions().await {
        Ok(sessions) => Json(SessionListResponse { sessions }).into_response(),
        Err(e) => error_response(e),
    }
}
