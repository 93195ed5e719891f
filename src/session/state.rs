// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-session pagination state

use crate::retrieval::{EvidenceRecord, SourceFilter};

/// Pagination and continue memory for one session.
///
/// `cursor` only moves forward, except when a new query replaces `results`
/// and resets it to 0. `last_query` is set whenever `cursor > 0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Full hit set of the last new query
    pub results: Vec<EvidenceRecord>,
    /// Offset of the next batch; may run past `results.len()`
    pub cursor: usize,
    pub last_query: Option<String>,
    /// Filter the stored results were retrieved under
    pub last_filter: SourceFilter,
}

impl SessionState {
    /// Replace the stored results with those of a new query
    pub fn begin_query(&mut self, query: &str, filter: SourceFilter, results: Vec<EvidenceRecord>) {
        self.results = results;
        self.cursor = 0;
        self.last_query = Some(query.to_string());
        self.last_filter = filter;
    }

    /// Remember a direct-chat question; chat keeps no results
    pub fn begin_chat(&mut self, query: &str) {
        self.results.clear();
        self.cursor = 0;
        self.last_query = Some(query.to_string());
        self.last_filter = SourceFilter::default();
    }

    pub fn has_previous_query(&self) -> bool {
        self.last_query.as_deref().is_some_and(|q| !q.is_empty())
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.results.len()
    }

    /// Slice `results[cursor..cursor + batch_size]` and advance the cursor by
    /// `batch_size`, even when fewer records remain.
    pub fn next_batch(&mut self, batch_size: usize) -> Vec<EvidenceRecord> {
        let start = self.cursor.min(self.results.len());
        let end = self.cursor.saturating_add(batch_size).min(self.results.len());
        let batch = self.results[start..end].to_vec();
        self.cursor = self.cursor.saturating_add(batch_size);
        batch
    }
}
