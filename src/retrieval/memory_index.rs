// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// In-memory vector index
// Passages live in process memory; search is a brute-force cosine scan

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::RwLock;

use super::index::VectorIndex;
use super::types::{IndexHit, RetrievalError, SearchRequest};
use crate::embeddings::cosine_similarity;

/// Passage stored in the index
#[derive(Clone, Debug)]
pub struct IndexedPassage {
    pub source: String,
    pub page: i64,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Cosine-similarity index over a bounded set of passages.
///
/// Native score is cosine similarity; hits report `1 - cosine` so that
/// lower is closer, matching the other backends.
#[derive(Debug)]
pub struct InMemoryIndex {
    collection: String,
    dimension: usize,
    max_passages: usize,
    passages: RwLock<Vec<IndexedPassage>>,
}

impl InMemoryIndex {
    /// Create an empty index
    ///
    /// # Arguments
    /// * `collection` - Identifier reported to the source-list cache
    /// * `dimension` - Required vector width
    /// * `max_passages` - Capacity limit
    pub fn new(collection: impl Into<String>, dimension: usize, max_passages: usize) -> Self {
        Self {
            collection: collection.into(),
            dimension,
            max_passages,
            passages: RwLock::new(Vec::new()),
        }
    }

    /// Add one passage
    ///
    /// # Returns
    /// * `Err` if the vector has the wrong width, contains NaN/Infinity, or
    ///   the index is full
    pub fn add(&self, passage: IndexedPassage) -> Result<(), RetrievalError> {
        if passage.vector.len() != self.dimension {
            return Err(RetrievalError::IndexResponse(format!(
                "Invalid vector dimensions: expected {}, got {}",
                self.dimension,
                passage.vector.len()
            )));
        }

        if passage.vector.iter().any(|v| !v.is_finite()) {
            return Err(RetrievalError::IndexResponse(
                "Invalid vector values: contains NaN or Infinity".to_string(),
            ));
        }

        let mut passages = self.write()?;
        if passages.len() >= self.max_passages {
            return Err(RetrievalError::IndexUnavailable(format!(
                "Maximum passage capacity reached: {} (max: {})",
                passages.len(),
                self.max_passages
            )));
        }
        passages.push(passage);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.passages.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every passage
    pub fn clear(&self) -> Result<(), RetrievalError> {
        self.write()?.clear();
        Ok(())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<IndexedPassage>>, RetrievalError> {
        self.passages
            .write()
            .map_err(|_| RetrievalError::IndexUnavailable("index lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Vec<IndexHit>>, RetrievalError> {
        if request.vector.len() != self.dimension {
            return Err(RetrievalError::IndexResponse(format!(
                "Query dimension {} does not match index dimension {}",
                request.vector.len(),
                self.dimension
            )));
        }

        let passages = self
            .passages
            .read()
            .map_err(|_| RetrievalError::IndexUnavailable("index lock poisoned".to_string()))?;

        let mut hits: Vec<IndexHit> = passages
            .iter()
            .filter(|p| request.filter.contains(&p.source))
            .map(|p| IndexHit {
                distance: 1.0 - cosine_similarity(&request.vector, &p.vector),
                source: p.source.clone(),
                page: p.page,
                text: p.text.clone(),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(request.limit);

        Ok(vec![hits])
    }

    async fn list_sources(&self) -> Result<Vec<String>, RetrievalError> {
        let passages = self
            .passages
            .read()
            .map_err(|_| RetrievalError::IndexUnavailable("index lock poisoned".to_string()))?;
        Ok(passages
            .iter()
            .map(|p| p.source.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
