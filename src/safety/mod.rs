// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Content-safety gate for user utterances

pub mod gate;
pub mod types;

pub use gate::{ForbiddenVocabulary, SafetyGate};
pub use types::{
    BlockReason, ModerationVerdict, SafetyConfig, SafetyError, DEFAULT_ALLOW_PHRASES,
    DEFAULT_BLOCKED_PATTERNS, DEFAULT_FORBIDDEN_TERMS,
};
