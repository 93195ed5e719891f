// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Source listing, uploads, history and session endpoints

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::errors::ApiError;
use super::http_server::{caller_identity, AppState};
use crate::history::{Feedback, HistoryEntry, SessionBuckets};
use crate::retrieval::UploadedPassage;

/// Longest accepted upload, in passages
const MAX_UPLOAD_PASSAGES: usize = 2_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesResponse {
    pub collection: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub collection: String,
    /// Whether a cached list was dropped
    pub invalidated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub session_id: String,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHistoryResponse {
    pub user_name: String,
    #[serde(flatten)]
    pub sessions: SessionBuckets,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub status: String,
}

impl FeedbackRequest {
    pub fn feedback(&self) -> Result<Feedback, ApiError> {
        self.status
            .parse::<Feedback>()
            .map_err(|message| ApiError::ValidationError {
                field: "status".to_string(),
                message,
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRemovedResponse {
    pub session_id: String,
    pub removed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub passages: Vec<UploadedPassage>,
}

impl UploadRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.passages.is_empty() {
            return Err(ApiError::ValidationError {
                field: "passages".to_string(),
                message: "At least one passage is required".to_string(),
            });
        }
        if self.passages.len() > MAX_UPLOAD_PASSAGES {
            return Err(ApiError::ValidationError {
                field: "passages".to_string(),
                message: format!("Too many passages (max {})", MAX_UPLOAD_PASSAGES),
            });
        }
        if let Some(i) = self.passages.iter().position(|p| p.text.trim().is_empty()) {
            return Err(ApiError::ValidationError {
                field: format!("passages[{}].text", i),
                message: "Passage text cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub user_name: String,
    pub indexed: usize,
}

/// GET /v1/files - Distinct source names in the collection
///
/// # Errors
/// - 503 Service Unavailable: index unreachable
/// - 504 Gateway Timeout: index did not answer in time
pub async fn list_sources_handler(
    State(state): State<AppState>,
) -> Result<Json<SourcesResponse>, ApiError> {
    let retriever = state.session.retriever();
    let files = retriever.list_sources().await?;
    Ok(Json(SourcesResponse {
        collection: retriever.collection().to_string(),
        files,
    }))
}

/// DELETE /v1/files/cache - Drop the cached source list
pub async fn invalidate_sources_handler(State(state): State<AppState>) -> Json<InvalidateResponse> {
    let retriever = state.session.retriever();
    let invalidated = retriever.invalidate_sources();
    info!("Source list cache invalidated: {}", invalidated);
    Json(InvalidateResponse {
        collection: retriever.collection().to_string(),
        invalidated,
    })
}

/// GET /v1/history/:session_id - The caller's history for a session
///
/// # Errors
/// - 404 Not Found: no entries for this caller and session
pub async fn history_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user_name = caller_identity(&headers);
    let entries = state.history.session_entries(&user_name, &session_id).await?;
    if entries.is_empty() {
        return Err(ApiError::NotFound(
            "No history found for this session".to_string(),
        ));
    }
    Ok(Json(HistoryResponse {
        session_id,
        entries,
    }))
}

/// GET /v1/history - The caller's sessions grouped by age
///
/// Each session is listed by its first prompt in today, yesterday, lastWeek
/// or lastMonth. Always 200, with empty groups when there is no history.
pub async fn user_history_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserHistoryResponse>, ApiError> {
    let user_name = caller_identity(&headers);
    let sessions = state.history.user_sessions(&user_name).await?;
    Ok(Json(UserHistoryResponse {
        user_name,
        sessions,
    }))
}

/// POST /v1/history/:id/comment - Comment on one of the caller's entries
///
/// # Response
/// The updated entry, or 204 No Content when the comment is blank (nothing
/// is stored).
///
/// # Errors
/// - 404 Not Found: no such entry for this caller
pub async fn comment_handler(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CommentRequest>,
) -> Result<Response, ApiError> {
    if request.comments.trim().is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    let user_name = caller_identity(&headers);
    let entry = state
        .history
        .set_comment(&user_name, &entry_id, &request.comments)
        .await?;
    info!("Comment saved on history {}", entry.id);
    Ok(Json(entry).into_response())
}

/// POST /v1/history/:id/feedback - Mark a response satisfied or unsatisfied
///
/// # Errors
/// - 400 Bad Request: status is not `satisfied` or `unsatisfied`
/// - 404 Not Found: no such entry for this caller
pub async fn feedback_handler(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<HistoryEntry>, ApiError> {
    let feedback = request.feedback()?;
    let user_name = caller_identity(&headers);
    let entry = state
        .history
        .set_feedback(&user_name, &entry_id, feedback)
        .await?;
    info!("Feedback {} recorded on history {}", feedback, entry.id);
    Ok(Json(entry))
}

/// DELETE /v1/sessions/:session_id - Forget a session's retrieval state
pub async fn remove_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<SessionRemovedResponse> {
    let removed = state.session.store().remove(&session_id).await;
    Json(SessionRemovedResponse {
        session_id,
        removed,
    })
}

/// POST /v1/uploads - Index the caller's document passages
///
/// Replaces any document the caller uploaded before.
///
/// # Errors
/// - 400 Bad Request: no passages, too many, or an empty passage
/// - 500 Internal Server Error: embedding failed
pub async fn upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    request.validate()?;
    let user_name = caller_identity(&headers);
    let indexed = state
        .session
        .uploads()
        .index_passages(&user_name, request.passages, state.embedder.as_ref())
        .await?;
    Ok(Json(UploadResponse { user_name, indexed }))
}
