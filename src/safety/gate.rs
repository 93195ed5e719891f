// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Two-stage moderation gate with allow-list override
//!
//! Order of checks, first match wins:
//! 1. Allow-list phrase (case-insensitive substring) -> Allowed
//! 2. Blocked pattern (case-insensitive regex) -> Blocked(Regex)
//! 3. Max cosine similarity against the forbidden vocabulary >= threshold -> Blocked(Semantic)
//! 4. Allowed

use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use tracing::{debug, info};

use super::types::{BlockReason, ModerationVerdict, SafetyConfig, SafetyError};
use crate::embeddings::{cosine_similarity, TextEmbedder};

/// Forbidden terms together with their precomputed embeddings.
///
/// Built once at start-up by [`ForbiddenVocabulary::initialise`] and shared
/// read-only by every turn.
#[derive(Debug, Clone)]
pub struct ForbiddenVocabulary {
    terms: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

impl ForbiddenVocabulary {
    /// Embed every term with `embedder`
    pub async fn initialise(
        embedder: &dyn TextEmbedder,
        terms: &[String],
    ) -> Result<Self, SafetyError> {
        let embeddings = embedder
            .embed_batch(terms)
            .await
            .map_err(|e| SafetyError::Embedding(e.to_string()))?;
        info!(
            "Forbidden vocabulary embedded: {} terms with {}",
            terms.len(),
            embedder.model_name()
        );
        Self::from_embeddings(terms.to_vec(), embeddings)
    }

    /// Build from embeddings computed elsewhere
    pub fn from_embeddings(
        terms: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, SafetyError> {
        if terms.len() != embeddings.len() {
            return Err(SafetyError::VocabularyMismatch {
                terms: terms.len(),
                embeddings: embeddings.len(),
            });
        }
        Ok(Self { terms, embeddings })
    }

    /// Most similar term and its score, or `None` for an empty vocabulary
    pub fn closest(&self, query: &[f32]) -> Option<(&str, f32)> {
        self.terms
            .iter()
            .zip(self.embeddings.iter())
            .map(|(term, embedding)| (term.as_str(), cosine_similarity(query, embedding)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Decides whether a raw user utterance may be answered
pub struct SafetyGate {
    /// Lowercased allow phrases
    allow_phrases: Vec<String>,
    patterns: Vec<Regex>,
    vocabulary: Arc<ForbiddenVocabulary>,
    embedder: Arc<dyn TextEmbedder>,
    threshold: f32,
}

impl SafetyGate {
    pub fn new(
        config: &SafetyConfig,
        vocabulary: Arc<ForbiddenVocabulary>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Result<Self, SafetyError> {
        let patterns = config
            .blocked_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| SafetyError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            allow_phrases: config
                .allow_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            patterns,
            vocabulary,
            embedder,
            threshold: config.threshold,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// True when the text contains any allow phrase
    pub fn contains_allow_phrase(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.allow_phrases
            .iter()
            .any(|phrase| lower.contains(phrase.as_str()))
    }

    /// First blocked pattern matching the text
    pub fn matching_pattern(&self, text: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|re| re.is_match(text))
            .map(|re| re.as_str())
    }

    /// Closest forbidden term and its similarity to `text`
    pub async fn semantic_score(&self, text: &str) -> Result<Option<(String, f32)>, SafetyError> {
        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| SafetyError::Embedding(e.to_string()))?;
        Ok(self
            .vocabulary
            .closest(&embedding)
            .map(|(term, score)| (term.to_string(), score)))
    }

    /// Run the full gate.
    ///
    /// Embedding failure is returned as an error; it never degrades to Allowed.
    pub async fn evaluate(&self, text: &str) -> Result<ModerationVerdict, SafetyError> {
        if self.contains_allow_phrase(text) {
            debug!("Moderation: allow phrase present");
            return Ok(ModerationVerdict::Allowed);
        }

        if let Some(pattern) = self.matching_pattern(text) {
            info!("Moderation blocked input: pattern {}", pattern);
            return Ok(ModerationVerdict::Blocked(BlockReason::Regex));
        }

        if let Some((term, score)) = self.semantic_score(text).await? {
            if score >= self.threshold {
                info!(
                    "Moderation blocked input: similarity {:.3} to '{}' (threshold {})",
                    score, term, self.threshold
                );
                return Ok(ModerationVerdict::Blocked(BlockReason::Semantic));
            }
            debug!("Moderation: closest term '{}' at {:.3}", term, score);
        }

        Ok(ModerationVerdict::Allowed)
    }
}
