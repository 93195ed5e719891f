// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for evidence retrieval

use std::env;
use std::time::Duration;

use super::milvus::MilvusConfig;

/// Configuration for evidence retrieval
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Vector index connection
    pub milvus: MilvusConfig,
    /// Hits requested per new query
    pub search_limit: usize,
    /// Passages surfaced to the generator per turn
    pub batch_size: usize,
    /// Hits taken from an uploaded document
    pub upload_top_k: usize,
    /// Source-list cache TTL in seconds
    pub source_cache_ttl_secs: u64,
}

impl RetrievalConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            milvus: MilvusConfig {
                url: env::var("MILVUS_URL").unwrap_or(defaults.milvus.url),
                collection: env::var("MILVUS_COLLECTION").unwrap_or(defaults.milvus.collection),
                token: env::var("MILVUS_TOKEN").ok().filter(|t| !t.is_empty()),
                timeout: env::var("MILVUS_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.milvus.timeout),
                ..defaults.milvus
            },
            search_limit: env::var("SEARCH_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.search_limit),
            batch_size: env::var("BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_size),
            upload_top_k: env::var("UPLOAD_TOP_K")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.upload_top_k),
            source_cache_ttl_secs: env::var("SOURCE_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.source_cache_ttl_secs),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.search_limit == 0 {
            return Err("Search limit must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("Batch size must be greater than 0".to_string());
        }
        if self.upload_top_k == 0 {
            return Err("Upload top-k must be greater than 0".to_string());
        }
        if self.milvus.collection.is_empty() {
            return Err("Collection name must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            milvus: MilvusConfig::default(),
            search_limit: 15,
            batch_size: 3,
            upload_top_k: 3,
            source_cache_ttl_secs: 300,
        }
    }
}
