// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Core types for evidence retrieval

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::filter::SourceFilter;

/// Fields requested from the index for every hit
pub const DEFAULT_OUTPUT_FIELDS: &[&str] = &["source", "page", "text"];

/// One retrieved passage.
///
/// `score` is a distance: LOWER IS CLOSER, for every index backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    pub source_id: String,
    pub page: i64,
    pub text: String,
    pub score: f32,
}

/// Raw hit as returned by a [`super::VectorIndex`]
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub distance: f32,
    pub source: String,
    pub page: i64,
    pub text: String,
}

impl From<IndexHit> for EvidenceRecord {
    fn from(hit: IndexHit) -> Self {
        Self {
            source_id: hit.source,
            page: hit.page,
            text: hit.text,
            score: hit.distance,
        }
    }
}

/// Read consistency requested from the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    #[default]
    Strong,
    Bounded,
    Session,
    Eventually,
}

impl ConsistencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Strong => "Strong",
            ConsistencyLevel::Bounded => "Bounded",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::Eventually => "Eventually",
        }
    }
}

/// One similarity-search call against an index
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub filter: SourceFilter,
    pub limit: usize,
    pub consistency: ConsistencyLevel,
    pub output_fields: Vec<String>,
}

impl SearchRequest {
    pub fn new(vector: Vec<f32>, filter: SourceFilter, limit: usize) -> Self {
        Self {
            vector,
            filter,
            limit,
            consistency: ConsistencyLevel::Strong,
            output_fields: DEFAULT_OUTPUT_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Retrieval failures. All of them are fatal to the turn.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Query embedding failed: {0}")]
    Embedding(String),

    #[error("Invalid file filter: {0}")]
    InvalidFilter(String),

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Unexpected vector index response: {0}")]
    IndexResponse(String),

    #[error("Vector index request timed out after {0}ms")]
    Timeout(u64),
}
