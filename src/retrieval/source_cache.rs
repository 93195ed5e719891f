// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! TTL cache of distinct source names per collection

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// TTL cache for source listings, keyed by collection
pub struct SourceListCache {
    cache: RwLock<HashMap<String, CachedSources>>,
    ttl: Duration,
}

struct CachedSources {
    sources: Vec<String>,
    inserted_at: Instant,
}

impl SourceListCache {
    /// Create a new cache
    ///
    /// # Arguments
    /// * `ttl` - Time-to-live for a listing
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Cached listing for a collection
    ///
    /// Returns None if not found or expired
    pub fn get(&self, collection: &str) -> Option<Vec<String>> {
        let cache = self.cache.read().ok()?;
        let entry = cache.get(collection)?;

        if entry.inserted_at.elapsed() > self.ttl {
            return None; // Expired
        }

        Some(entry.sources.clone())
    }

    pub fn insert(&self, collection: &str, sources: &[String]) {
        let mut cache = match self.cache.write() {
            Ok(c) => c,
            Err(_) => return,
        };
        cache.insert(
            collection.to_string(),
            CachedSources {
                sources: sources.to_vec(),
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop the listing for a collection. Returns true if one was cached.
    pub fn invalidate(&self, collection: &str) -> bool {
        match self.cache.write() {
            Ok(mut cache) => cache.remove(collection).is_some(),
            Err(_) => false,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
