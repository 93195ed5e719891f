// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Set-membership predicate over a record's source name

use std::collections::BTreeSet;

use super::types::RetrievalError;

/// Set of source names a search is restricted to. Empty means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFilter {
    sources: BTreeSet<String>,
}

impl SourceFilter {
    /// Build a filter, rejecting empty names and names with control characters
    pub fn new<I, S>(sources: I) -> Result<Self, RetrievalError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for source in sources {
            let source = source.into();
            if source.trim().is_empty() {
                return Err(RetrievalError::InvalidFilter(
                    "source name must not be empty".to_string(),
                ));
            }
            if source.chars().any(char::is_control) {
                return Err(RetrievalError::InvalidFilter(format!(
                    "source name contains control characters: {:?}",
                    source
                )));
            }
            set.insert(source);
        }
        Ok(Self { sources: set })
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Evaluate the predicate in memory
    pub fn contains(&self, source: &str) -> bool {
        self.sources.is_empty() || self.sources.contains(source)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(String::as_str)
    }

    /// Inclusion expression for the index, e.g. `source in ['a.pdf', 'b.pdf']`.
    ///
    /// Returns `None` for an unrestricted filter.
    pub fn to_expression(&self, field: &str) -> Option<String> {
        if self.sources.is_empty() {
            return None;
        }
        let quoted = self
            .sources
            .iter()
            .map(|s| format!("'{}'", escape(s)))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!("{} in [{}]", field, quoted))
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
