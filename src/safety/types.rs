// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Moderation verdicts, configuration and default vocabularies

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use thiserror::Error;

/// Which stage of the gate rejected the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// A whole-word blocked pattern matched
    Regex,
    /// The input embedding was too close to a forbidden term
    Semantic,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::Regex => "regex",
            BlockReason::Semantic => "semantic",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a moderation check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationVerdict {
    Allowed,
    Blocked(BlockReason),
}

impl ModerationVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ModerationVerdict::Allowed)
    }
}

/// Errors raised while moderating
#[derive(Debug, Error)]
pub enum SafetyError {
    /// Embedding the input (or the vocabulary) failed
    #[error("Moderation embedding failed: {0}")]
    Embedding(String),

    /// A configured blocked pattern does not compile
    #[error("Invalid blocked pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Vocabulary terms and embeddings disagree in count
    #[error("Vocabulary has {terms} terms but {embeddings} embeddings")]
    VocabularyMismatch { terms: usize, embeddings: usize },
}

/// Terms whose embeddings form the semantic blocklist
pub const DEFAULT_FORBIDDEN_TERMS: &[&str] = &[
    "political",
    "scandal",
    "vulgar",
    "offensive",
    "corruption",
    "sexual",
    "harassment",
    "abuse",
    "violence",
    "racism",
    "terrorism",
    "hate",
    "illegal",
    "extremism",
    "fraud",
    "bribery",
    "discrimination",
    "protest",
    "controversy",
    "misinformation",
    "kill",
    "murder",
    "assassinate",
    "homicide",
    "massacre",
];

/// Whole-word patterns, matched case-insensitively
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] = &[
    r"\bkill\b",
    r"\bmurder\b",
    r"\bassassinat(e|ion)\b",
    r"\bhomicide\b",
    r"\bmassacre\b",
    r"\bLarsen\s*and\s*Toubro\b",
    r"\bpolitical\b",
    r"\bscandal\b",
    r"\bvulgar\b",
    r"\boffensive\b",
    r"\bcorruption\b",
    r"\bsexual\b",
    r"\bharassment\b",
    r"\babuse\b",
    r"\bviolence\b",
    r"\bracism\b",
    r"\bterrorism\b",
    r"\bhate\b",
    r"\billegal\b",
    r"\bextremism\b",
    r"\bfraud\b",
    r"\bbribery\b",
    r"\bdiscrimination\b",
    r"\bprotest\b",
    r"\bcontroversy\b",
    r"\bmisinformation\b",
];

/// Neutral or positive phrases that bypass every other check
pub const DEFAULT_ALLOW_PHRASES: &[&str] = &[
    "CEO of L&T",
    "L&T achievements",
    "L&T growth",
    "L&T company",
    "L&T business",
    "L&T leadership",
    "L&T innovation",
    "L&T history",
    "Larsen and Toubro",
    "L&T CEO",
    "Larsen and Toubro achievements",
    "Larsen and Toubro growth",
    "Larsen and Toubro leadership",
];

/// Configuration for the moderation gate
#[derive(Debug, Clone)]
pub struct SafetyConfig {
    /// Cosine similarity at or above which input is blocked
    pub threshold: f32,
    pub allow_phrases: Vec<String>,
    pub blocked_patterns: Vec<String>,
    pub forbidden_terms: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            allow_phrases: DEFAULT_ALLOW_PHRASES.iter().map(|s| s.to_string()).collect(),
            blocked_patterns: DEFAULT_BLOCKED_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            forbidden_terms: DEFAULT_FORBIDDEN_TERMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SafetyConfig {
    /// Defaults, with the threshold and extra vocabulary taken from the environment.
    ///
    /// `MODERATION_EXTRA_ALLOW`, `MODERATION_EXTRA_PATTERNS` and
    /// `MODERATION_EXTRA_TERMS` are `;`-separated lists appended to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(threshold) = env::var("MODERATION_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.threshold = threshold;
        }
        config.allow_phrases.extend(split_list("MODERATION_EXTRA_ALLOW"));
        config
            .blocked_patterns
            .extend(split_list("MODERATION_EXTRA_PATTERNS"));
        config
            .forbidden_terms
            .extend(split_list("MODERATION_EXTRA_TERMS"));
        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!(
                "Moderation threshold must be within [0, 1], got {}",
                self.threshold
            ));
        }
        Ok(())
    }
}

fn split_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|v| {
            v.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
