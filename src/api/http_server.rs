// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};

use super::files::{
    comment_handler, feedback_handler, history_handler, invalidate_sources_handler,
    list_sources_handler, remove_session_handler, upload_handler, user_history_handler,
};
use super::generate::generate_handler;
use crate::embeddings::TextEmbedder;
use crate::history::HistoryStore;
use crate::turn::RetrievalSession;

/// Header naming the caller; requests without it act as `anonymous`
pub const USER_NAME_HEADER: &str = "x-user-name";

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RetrievalSession>,
    pub history: Arc<dyn HistoryStore>,
    /// Used to index uploaded documents
    pub embedder: Arc<dyn TextEmbedder>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Turn endpoint
        .route("/v1/generate", post(generate_handler))
        // Source listing
        .route("/v1/files", get(list_sources_handler))
        .route("/v1/files/cache", delete(invalidate_sources_handler))
        // Uploaded documents
        .route("/v1/uploads", post(upload_handler))
        // History and sessions
        // `:id` is a session id for GET and an entry id for the POST routes;
        // the router needs one parameter name per position
        .route("/v1/history", get(user_history_handler))
        .route("/v1/history/:id", get(history_handler))
        .route("/v1/history/:id/comment", post(comment_handler))
        .route("/v1/history/:id/feedback", post(feedback_handler))
        .route("/v1/sessions/:session_id", delete(remove_session_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Caller identity from the `X-User-Name` header
pub fn caller_identity(headers: &HeaderMap) -> String {
    headers
        .get(USER_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.session.store().session_count().await;
    Json(json!({
        "status": "healthy",
        "version": crate::version::VERSION_NUMBER,
        "collection": state.session.retriever().collection(),
        "sessions": sessions,
    }))
}
