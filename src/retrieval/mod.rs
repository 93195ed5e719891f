// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Evidence retrieval over a vector index
//!
//! Provides:
//! - `EvidenceRetriever`: query encoding, search and hit flattening
//! - `VectorIndex` backends: Milvus REST and in-memory
//! - `SourceFilter`: the inclusion predicate on source names
//! - `SourceListCache`: TTL cache of each collection's sources

pub mod config;
pub mod filter;
pub mod index;
pub mod memory_index;
pub mod milvus;
pub mod retriever;
pub mod source_cache;
pub mod types;
pub mod uploads;

pub use config::RetrievalConfig;
pub use filter::SourceFilter;
pub use index::VectorIndex;
pub use memory_index::{InMemoryIndex, IndexedPassage};
pub use milvus::{MilvusConfig, MilvusRestIndex};
pub use retriever::{flatten_hits, EvidenceRetriever};
pub use source_cache::SourceListCache;
pub use types::{ConsistencyLevel, EvidenceRecord, IndexHit, RetrievalError, SearchRequest};
pub use uploads::{UploadedDocuments, UploadedPassage};
