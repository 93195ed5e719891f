// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Turn endpoint
//!
//! Streams a turn's fragments as a chunked `text/plain` body, then writes the
//! end-of-turn padding.

use async_stream::stream;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::errors::ApiError;
use super::http_server::{caller_identity, AppState};
use crate::history::HistoryStore;
use crate::relay::StreamFragment;
use crate::turn::{TurnMode, TurnRequest, TurnStream, END_OF_TURN_PADDING};

pub const HISTORY_ID_HEADER: &str = "x-history-id";
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Longest accepted prompt, in characters
const MAX_PROMPT_CHARS: usize = 8_000;

/// Request body for POST /v1/generate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// The user's utterance, or `continue`
    #[serde(alias = "prompt")]
    pub user_input: String,

    /// Generated when absent
    #[serde(default, alias = "session_id")]
    pub session_id: Option<String>,

    /// `retrieval` (alias `qa`) or `chat`; empty means retrieval
    #[serde(default)]
    pub mode: Option<String>,

    /// Source names to restrict retrieval to
    #[serde(default, alias = "file_names")]
    pub file_filter: Vec<String>,

    /// Answer from the caller's uploaded document
    #[serde(default, alias = "useruploadfile", deserialize_with = "truthy")]
    pub use_uploaded_document: bool,
}

impl GenerateRequest {
    /// Validate the request
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.user_input.trim().is_empty() {
            return Err(ApiError::ValidationError {
                field: "userInput".to_string(),
                message: "Prompt cannot be empty".to_string(),
            });
        }
        if self.user_input.chars().count() > MAX_PROMPT_CHARS {
            return Err(ApiError::ValidationError {
                field: "userInput".to_string(),
                message: format!("Prompt too long (max {} characters)", MAX_PROMPT_CHARS),
            });
        }
        Ok(())
    }

    pub fn turn_mode(&self) -> Result<TurnMode, ApiError> {
        match self.mode.as_deref().map(str::trim) {
            None | Some("") => Ok(TurnMode::default()),
            Some(mode) => mode.parse::<TurnMode>().map_err(|e| ApiError::ValidationError {
                field: "mode".to_string(),
                message: e,
            }),
        }
    }
}

/// Accept booleans, numbers and strings (`"true"`, `"1"`, any non-empty name)
fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        serde_json::Value::String(s) => {
            let s = s.trim().to_lowercase();
            !(s.is_empty() || s == "false" || s == "0")
        }
        _ => false,
    })
}

/// POST /v1/generate - Run one turn
///
/// # Response
/// Chunked `text/plain`: the turn's fragments in order, then six spaces.
/// Headers `X-History-ID` and `X-Session-ID` identify the recorded prompt and
/// the (possibly generated) session.
///
/// # Errors
/// - 400 Bad Request: empty prompt or unknown mode
/// - 500 Internal Server Error: the prompt could not be recorded
pub async fn generate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    request.validate()?;
    let mode = request.turn_mode()?;

    let session_id = request
        .session_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let user_name = caller_identity(&headers);

    let entry = state
        .history
        .create_entry(&session_id, &user_name, &request.user_input)
        .await?;
    info!(
        "Generate: session={} user={} history={}",
        session_id, user_name, entry.id
    );

    let turn = TurnRequest {
        session_id: session_id.clone(),
        user_input: request.user_input,
        mode,
        file_filter: request.file_filter,
        use_uploaded_document: request.use_uploaded_document,
        user_name,
    };
    let fragments = state.session.handle_turn(turn);
    let body = response_body(fragments, state.history.clone(), entry.id.clone());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(HISTORY_ID_HEADER, entry.id.as_str())
        .header(SESSION_ID_HEADER, session_id.as_str())
        .header(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            "X-History-ID, X-Session-ID",
        )
        .body(Body::from_stream(body))
        .map_err(|e| ApiError::InternalError(e.to_string()))
}

/// Body chunks for a turn.
///
/// Text fragments are written as they arrive. After the terminal marker the
/// collected text (newline-joined) is saved to history by a detached task and
/// the padding chunk is written. A client that disconnects early drops this
/// stream, and with it the turn.
pub fn response_body(
    mut fragments: TurnStream,
    history: Arc<dyn HistoryStore>,
    entry_id: String,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream! {
        let mut collected: Vec<String> = Vec::new();
        while let Some(fragment) = fragments.next().await {
            match fragment {
                StreamFragment::Text(text) => {
                    collected.push(text.clone());
                    yield Ok(Bytes::from(text));
                }
                StreamFragment::Done => break,
                StreamFragment::Failed(cause) => {
                    debug!("Turn for history {} ended with failure: {}", entry_id, cause);
                    break;
                }
            }
        }

        let response = collected.join("\n");
        tokio::spawn(async move {
            if let Err(e) = history.complete_entry(&entry_id, &response).await {
                warn!("Failed to save response for history {}: {}", entry_id, e);
            }
        });

        yield Ok(Bytes::from_static(END_OF_TURN_PADDING.as_bytes()));
    }
}
