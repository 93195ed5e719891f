// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Turn-level failures
//!
//! Every variant ends the turn with an error fragment and `Failed`:
//! - Moderation: the gate could not embed the input
//! - Retrieval: index unreachable, malformed filter, query encoding failed
//! - Generation: upstream status or connection failure
//! - Timeout: the per-turn deadline expired

use thiserror::Error;

use crate::relay::RelayError;
use crate::retrieval::RetrievalError;
use crate::safety::SafetyError;

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("{0}")]
    Moderation(#[from] SafetyError),

    #[error("{0}")]
    Retrieval(#[from] RetrievalError),

    #[error("{0}")]
    Generation(String),

    #[error("Turn exceeded its deadline of {0}ms")]
    Timeout(u64),
}

impl From<RelayError> for TurnError {
    fn from(e: RelayError) -> Self {
        TurnError::Generation(e.to_string())
    }
}

impl TurnError {
    /// Text of the error fragment shown to the caller
    pub fn user_message(&self) -> String {
        format!("Error occurred: {}", self)
    }

    /// Stable code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            TurnError::Moderation(_) => "MODERATION_FAILED",
            TurnError::Retrieval(RetrievalError::InvalidFilter(_)) => "INVALID_FILTER",
            TurnError::Retrieval(_) => "RETRIEVAL_FAILED",
            TurnError::Generation(_) => "GENERATION_FAILED",
            TurnError::Timeout(_) => "TURN_TIMEOUT",
        }
    }

    /// Check if retrying the same turn may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TurnError::Retrieval(RetrievalError::InvalidFilter(_))
        )
    }
}
