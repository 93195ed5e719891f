// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Evidence retrieval
//!
//! Encodes the query, runs the index search and flattens the hit groups into
//! one list ordered best first (ascending distance).

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::filter::SourceFilter;
use super::index::VectorIndex;
use super::source_cache::SourceListCache;
use super::types::{EvidenceRecord, IndexHit, RetrievalError, SearchRequest};
use crate::embeddings::TextEmbedder;

/// Wraps a vector index and the query encoder
pub struct EvidenceRetriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn TextEmbedder>,
    sources: SourceListCache,
}

impl EvidenceRetriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn TextEmbedder>,
        source_cache_ttl: Duration,
    ) -> Self {
        Self {
            index,
            embedder,
            sources: SourceListCache::new(source_cache_ttl),
        }
    }

    pub fn collection(&self) -> &str {
        self.index.collection()
    }

    /// Search the configured index.
    ///
    /// An empty result is `Ok(vec![])`, not an error.
    pub async fn search(
        &self,
        query: &str,
        filter: &SourceFilter,
        limit: usize,
    ) -> Result<Vec<EvidenceRecord>, RetrievalError> {
        self.search_in(self.index.as_ref(), query, filter, limit)
            .await
    }

    /// Search an arbitrary index with the shared query encoder
    pub async fn search_in(
        &self,
        index: &dyn VectorIndex,
        query: &str,
        filter: &SourceFilter,
        limit: usize,
    ) -> Result<Vec<EvidenceRecord>, RetrievalError> {
        let start = Instant::now();

        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        let request = SearchRequest::new(vector, filter.clone(), limit);
        let groups = index.search(&request).await?;
        let records = flatten_hits(groups, limit);

        info!(
            "Retrieved {} passages from {} ({}) in {}ms",
            records.len(),
            index.name(),
            index.collection(),
            start.elapsed().as_millis()
        );
        Ok(records)
    }

    /// Distinct source names of the active collection, cached with a TTL
    pub async fn list_sources(&self) -> Result<Vec<String>, RetrievalError> {
        let collection = self.index.collection();
        if let Some(sources) = self.sources.get(collection) {
            debug!("Source list cache hit for {}", collection);
            return Ok(sources);
        }

        let sources = self.index.list_sources().await?;
        self.sources.insert(collection, &sources);
        Ok(sources)
    }

    /// Forget the cached source list for the active collection
    pub fn invalidate_sources(&self) -> bool {
        self.sources.invalidate(self.index.collection())
    }
}

/// Merge hit groups into one sequence ordered by ascending distance.
///
/// The sort is stable, so ties keep the index's order.
pub fn flatten_hits(groups: Vec<Vec<IndexHit>>, limit: usize) -> Vec<EvidenceRecord> {
    let mut hits: Vec<IndexHit> = groups.into_iter().flatten().collect();
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.truncate(limit);
    hits.into_iter().map(EvidenceRecord::from).collect()
}
