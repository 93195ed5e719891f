// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-user indexes built from uploaded documents

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::memory_index::{InMemoryIndex, IndexedPassage};
use super::types::RetrievalError;
use crate::embeddings::TextEmbedder;

/// A pre-chunked passage of an uploaded document
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedPassage {
    pub source: String,
    #[serde(default)]
    pub page: i64,
    pub text: String,
}

/// Registry of uploaded-document indexes keyed by user name.
///
/// A new upload replaces the user's previous index.
pub struct UploadedDocuments {
    indexes: RwLock<HashMap<String, Arc<InMemoryIndex>>>,
    max_passages: usize,
}

impl UploadedDocuments {
    pub fn new(max_passages: usize) -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
            max_passages,
        }
    }

    /// Index for a user, if they uploaded something
    pub async fn get(&self, user: &str) -> Option<Arc<InMemoryIndex>> {
        self.indexes.read().await.get(user).cloned()
    }

    pub async fn insert(&self, user: &str, index: Arc<InMemoryIndex>) {
        self.indexes.write().await.insert(user.to_string(), index);
    }

    pub async fn remove(&self, user: &str) -> bool {
        self.indexes.write().await.remove(user).is_some()
    }

    /// Embed passages and replace the user's index with them.
    ///
    /// Returns the number of passages stored.
    pub async fn index_passages(
        &self,
        user: &str,
        passages: Vec<UploadedPassage>,
        embedder: &dyn TextEmbedder,
    ) -> Result<usize, RetrievalError> {
        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        let index = InMemoryIndex::new(
            format!("uploads/{}", user),
            embedder.dimension(),
            self.max_passages,
        );
        for (passage, vector) in passages.into_iter().zip(vectors) {
            index.add(IndexedPassage {
                source: passage.source,
                page: passage.page,
                text: passage.text,
                vector,
            })?;
        }

        let count = index.len();
        self.insert(user, Arc::new(index)).await;
        info!("Indexed {} uploaded passages for user {}", count, user);
        Ok(count)
    }
}

impl Default for UploadedDocuments {
    fn default() -> Self {
        Self::new(10_000)
    }
}
