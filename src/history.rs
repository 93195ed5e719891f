// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt/response history
//!
//! An entry is created when a turn starts and completed with the full
//! response once the fragment stream has ended. Callers can later attach a
//! comment and satisfied/unsatisfied feedback to their own entries.

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub session_id: String,
    pub user_name: String,
    pub prompt: String,
    /// Empty until the turn completes
    pub response: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
}

/// Thumbs up or down on a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Satisfied,
    Unsatisfied,
}

impl FromStr for Feedback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "satisfied" => Ok(Feedback::Satisfied),
            "unsatisfied" => Ok(Feedback::Unsatisfied),
            other => Err(format!(
                "Unknown feedback status '{}' (expected satisfied or unsatisfied)",
                other
            )),
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::Satisfied => write!(f, "satisfied"),
            Feedback::Unsatisfied => write!(f, "unsatisfied"),
        }
    }
}

/// A user's sessions by age, each represented by its first prompt.
///
/// Buckets are by calendar day (UTC): today, yesterday, the five days before
/// that, then the three weeks before those. Older sessions are not listed.
/// Each bucket is newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBuckets {
    pub today: Vec<HistoryEntry>,
    pub yesterday: Vec<HistoryEntry>,
    pub last_week: Vec<HistoryEntry>,
    pub last_month: Vec<HistoryEntry>,
}

impl SessionBuckets {
    pub fn is_empty(&self) -> bool {
        self.today.is_empty()
            && self.yesterday.is_empty()
            && self.last_week.is_empty()
            && self.last_month.is_empty()
    }
}

/// Group one user's entries into [`SessionBuckets`] relative to `today`.
///
/// The first prompt of a session is taken per bucket, so a session that
/// spans two buckets appears in both.
pub fn bucket_sessions(entries: &[HistoryEntry], today: NaiveDate) -> SessionBuckets {
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    let week_start = today.checked_sub_days(Days::new(7)).unwrap_or(today);
    let month_start = today.checked_sub_days(Days::new(28)).unwrap_or(today);

    let first_prompts = |in_bucket: &dyn Fn(NaiveDate) -> bool| {
        let mut first: HashMap<&str, &HistoryEntry> = HashMap::new();
        for entry in entries
            .iter()
            .filter(|e| in_bucket(e.created_at.date_naive()))
        {
            first
                .entry(entry.session_id.as_str())
                .and_modify(|current| {
                    if entry.created_at < current.created_at {
                        *current = entry;
                    }
                })
                .or_insert(entry);
        }
        let mut bucket: Vec<HistoryEntry> = first.into_values().cloned().collect();
        bucket.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bucket
    };

    SessionBuckets {
        today: first_prompts(&|day: NaiveDate| day == today),
        yesterday: first_prompts(&|day: NaiveDate| day == yesterday),
        last_week: first_prompts(&|day: NaiveDate| day >= week_start && day < yesterday),
        last_month: first_prompts(&|day: NaiveDate| day >= month_start && day < week_start),
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History entry not found: {0}")]
    NotFound(String),

    #[error("History storage failed: {0}")]
    Storage(String),
}

/// Persistence for prompt history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record a prompt with an empty response
    async fn create_entry(
        &self,
        session_id: &str,
        user_name: &str,
        prompt: &str,
    ) -> Result<HistoryEntry, HistoryError>;

    /// Attach the full response to an entry
    async fn complete_entry(&self, id: &str, response: &str) -> Result<(), HistoryError>;

    /// A user's entries for one session, oldest first
    async fn session_entries(
        &self,
        user_name: &str,
        session_id: &str,
    ) -> Result<Vec<HistoryEntry>, HistoryError>;

    /// A user's sessions grouped by age
    async fn user_sessions(&self, user_name: &str) -> Result<SessionBuckets, HistoryError>;

    /// Attach a comment to one of the user's entries.
    ///
    /// `NotFound` when the entry does not exist or belongs to someone else.
    async fn set_comment(
        &self,
        user_name: &str,
        id: &str,
        comment: &str,
    ) -> Result<HistoryEntry, HistoryError>;

    /// Record feedback on one of the user's entries; same ownership rule
    async fn set_feedback(
        &self,
        user_name: &str,
        id: &str,
        feedback: Feedback,
    ) -> Result<HistoryEntry, HistoryError>;
}

#[derive(Default)]
struct Entries {
    by_id: HashMap<String, HistoryEntry>,
    last_created: Option<DateTime<Utc>>,
}

/// Process-memory [`HistoryStore`]
///
/// `created_at` is strictly increasing across entries so that ordering by it
/// matches insertion order.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: RwLock<Entries>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.by_id.len()
    }

    /// Apply `update` to the caller's entry under the write lock
    async fn update_owned<F>(
        &self,
        user_name: &str,
        id: &str,
        update: F,
    ) -> Result<HistoryEntry, HistoryError>
    where
        F: FnOnce(&mut HistoryEntry) + Send,
    {
        let mut entries = self.entries.write().await;
        let entry = entries
            .by_id
            .get_mut(id)
            .filter(|e| e.user_name == user_name)
            .ok_or_else(|| HistoryError::NotFound(id.to_string()))?;
        update(entry);
        Ok(entry.clone())
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn create_entry(
        &self,
        session_id: &str,
        user_name: &str,
        prompt: &str,
    ) -> Result<HistoryEntry, HistoryError> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let created_at = match entries.last_created {
            Some(last) if now <= last => last + chrono::Duration::nanoseconds(1),
            _ => now,
        };
        entries.last_created = Some(created_at);

        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            user_name: user_name.to_string(),
            prompt: prompt.to_string(),
            response: String::new(),
            created_at,
            completed_at: None,
            comments: None,
            feedback: None,
        };
        entries.by_id.insert(entry.id.clone(), entry.clone());
        Ok(entry)
    }

    async fn complete_entry(&self, id: &str, response: &str) -> Result<(), HistoryError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .by_id
            .get_mut(id)
            .ok_or_else(|| HistoryError::NotFound(id.to_string()))?;
        entry.response = response.to_string();
        entry.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn session_entries(
        &self,
        user_name: &str,
        session_id: &str,
    ) -> Result<Vec<HistoryEntry>, HistoryError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<HistoryEntry> = entries
            .by_id
            .values()
            .filter(|e| e.session_id == session_id && e.user_name == user_name)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.created_at);
        Ok(matching)
    }

    async fn user_sessions(&self, user_name: &str) -> Result<SessionBuckets, HistoryError> {
        let entries = self.entries.read().await;
        let owned: Vec<HistoryEntry> = entries
            .by_id
            .values()
            .filter(|e| e.user_name == user_name)
            .cloned()
            .collect();
        Ok(bucket_sessions(&owned, Utc::now().date_naive()))
    }

    async fn set_comment(
        &self,
        user_name: &str,
        id: &str,
        comment: &str,
    ) -> Result<HistoryEntry, HistoryError> {
        let comment = comment.to_string();
        self.update_owned(user_name, id, move |entry| entry.comments = Some(comment))
            .await
    }

    async fn set_feedback(
        &self,
        user_name: &str,
        id: &str,
        feedback: Feedback,
    ) -> Result<HistoryEntry, HistoryError> {
        self.update_owned(user_name, id, move |entry| entry.feedback = Some(feedback))
            .await
    }
}
