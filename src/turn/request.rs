// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Turn input

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a turn is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnMode {
    /// Grounded on retrieved evidence, with pagination and citations
    #[default]
    #[serde(alias = "qa", alias = "QA")]
    Retrieval,
    /// Direct chat under a fixed persona instruction
    Chat,
}

impl TurnMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnMode::Retrieval => "retrieval",
            TurnMode::Chat => "chat",
        }
    }
}

impl fmt::Display for TurnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TurnMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retrieval" | "qa" => Ok(TurnMode::Retrieval),
            "chat" => Ok(TurnMode::Chat),
            other => Err(format!("Unknown mode '{}'", other)),
        }
    }
}

/// One user-submitted input
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub session_id: String,
    pub user_input: String,
    pub mode: TurnMode,
    /// Source names to restrict retrieval to; empty means all
    pub file_filter: Vec<String>,
    /// Answer from the caller's uploaded document instead of the index
    pub use_uploaded_document: bool,
    /// Caller identity, used to find uploaded documents
    pub user_name: String,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_input: user_input.into(),
            mode: TurnMode::default(),
            file_filter: Vec::new(),
            use_uploaded_document: false,
            user_name: "anonymous".to_string(),
        }
    }

    pub fn with_mode(mut self, mode: TurnMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_file_filter<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_filter = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_uploaded_document(mut self, user_name: impl Into<String>) -> Self {
        self.use_uploaded_document = true;
        self.user_name = user_name.into();
        self
    }

    pub fn with_user(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }
}
