// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vector index abstraction

use async_trait::async_trait;

use super::types::{IndexHit, RetrievalError, SearchRequest};

/// A similarity-search backend.
///
/// Hits carry a distance where lower is closer. Backends whose native score
/// is a similarity convert it before returning.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Run a similarity search. One group per query vector.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Vec<IndexHit>>, RetrievalError>;

    /// Distinct source names stored in the collection
    async fn list_sources(&self) -> Result<Vec<String>, RetrievalError>;

    /// Collection identifier, used as the source-list cache key
    fn collection(&self) -> &str;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
