//! HTTP API over a shared [`Assistant`].
//!
//! - `POST /api/chat`  `{message, session_id?}` → `{response, session_id}`
//! - `POST /api/reset` `{session_id?}` → `{ok: true}`
//! - `GET  /api/urls`  → every known URL record
//! - `GET  /health`    → `{status: "ok", urls: n}`

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::agent_core::{Assistant, DEFAULT_SESSION};
use crate::site::UrlRecord;

/// Shared state for all routes.
pub type AppState = Arc<Assistant>;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/reset", post(reset_handler))
        .route("/api/urls", get(urls_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(assistant: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        %addr,
        urls = assistant.get_all_urls().len(),
        model = %assistant.model_name(),
        "server listening"
    );

    axum::serve(listener, router(assistant))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("serving HTTP")?;
    Ok(())
}

async fn chat_handler(
    State(assistant): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message cannot be empty".into()));
    }

    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let response = assistant.chat_in(&session_id, &request.message).await;
    Ok(Json(ChatResponse {
        response,
        session_id,
    }))
}

async fn reset_handler(
    State(assistant): State<AppState>,
    request: Option<Json<ResetRequest>>,
) -> Json<Value> {
    let session_id = request
        .and_then(|Json(r)| r.session_id)
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());
    assistant.reset_session(&session_id);
    Json(json!({ "ok": true }))
}

async fn urls_handler(State(assistant): State<AppState>) -> Json<Vec<UrlRecord>> {
    Json(assistant.get_all_urls().to_vec())
}

async fn health_handler(State(assistant): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "urls": assistant.get_all_urls().len()
    }))
}
