//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{CancelResponse, ChatRequest, ChatResponse, ErrorResponse, QuickStartResponse};
use super::AppState;
use crate::prompt::QUICK_START;
use crate::runtime::{ConversationSnapshot, SubmitError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Conversation
        .route("/api/conversation", get(get_conversation))
        .route("/api/conversation/chat", post(send_chat))
        .route("/api/conversation/cancel", post(cancel_generation))
        .route("/api/conversation/stream", get(stream_conversation))
        // Shortcuts
        .route("/api/quick-start", get(list_quick_start))
        .route("/api/quick-start/:index", post(send_quick_start))
        // Version
        .route("/version", get(get_version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Conversation
// ============================================================

async fn get_conversation(State(state): State<AppState>) -> Json<ConversationSnapshot> {
    Json(state.chat.snapshot())
}

async fn send_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    state.chat.submit(&req.text).await?;
    Ok((StatusCode::ACCEPTED, Json(ChatResponse { queued: true })))
}

async fn cancel_generation(
    State(state): State<AppState>,
) -> Result<Json<CancelResponse>, AppError> {
    state.chat.cancel().await?;
    Ok(Json(CancelResponse { ok: true }))
}

async fn stream_conversation(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe before taking the snapshot; the stream drops what it already covers
    let broadcast_rx = state.chat.subscribe();
    sse_stream(state.chat.snapshot(), broadcast_rx)
}

// ============================================================
// Quick Start
// ============================================================

async fn list_quick_start() -> Json<QuickStartResponse> {
    Json(QuickStartResponse {
        prompts: QUICK_START.to_vec(),
    })
}

async fn send_quick_start(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    let prompt = QUICK_START
        .get(index)
        .ok_or_else(|| AppError::NotFound(format!("No quick-start prompt at index {index}")))?;
    state.chat.submit(prompt).await?;
    Ok((StatusCode::ACCEPTED, Json(ChatResponse { queued: true })))
}

async fn get_version() -> &'static str {
    concat!("myfree-agent ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
}

impl From<SubmitError> for AppError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Blank => AppError::BadRequest(e.to_string()),
            SubmitError::Busy => AppError::Conflict(e.to_string()),
            SubmitError::Closed => AppError::Unavailable(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
