// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wire and fragment types for the streaming relay

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One unit of a turn's output, delivered in generation order.
///
/// `Done` and `Failed` are terminal; nothing follows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFragment {
    Text(String),
    Done,
    Failed(String),
}

impl StreamFragment {
    pub fn text(value: impl Into<String>) -> Self {
        StreamFragment::Text(value.into())
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamFragment::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StreamFragment::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of the upstream chat-completions call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub max_tokens: u32,
}

/// One decoded streaming event; only the delta text is used
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkEvent {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChunkEvent {
    /// Text delta of the first choice, if any
    pub fn delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }
}

/// Upstream generation failures
#[derive(Debug, Error)]
pub enum RelayError {
    /// The endpoint answered with a non-success status
    #[error("Upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// The connection failed or broke mid-stream
    #[error("Upstream connection failed: {0}")]
    Connection(String),

    /// The request could not be built
    #[error("Invalid upstream request: {0}")]
    Request(String),
}
