// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-wide session store
//!
//! Each session has its own mutex. Turns for different sessions never contend
//! beyond the brief map lookup; turns for the same session are serialised by
//! holding a [`SessionGuard`] across load-modify-store.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use super::state::SessionState;

#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Sessions beyond this evict the longest-idle unlocked session
    pub max_sessions: usize,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    state: SessionState,
    last_touched: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            state: SessionState::default(),
            last_touched: Instant::now(),
        }
    }
}

type SharedEntry = Arc<Mutex<SessionEntry>>;

/// Exclusive access to one session's state.
///
/// The session is marked as touched when the guard is dropped.
pub struct SessionGuard {
    entry: OwnedMutexGuard<SessionEntry>,
}

impl Deref for SessionGuard {
    type Target = SessionState;

    fn deref(&self) -> &SessionState {
        &self.entry.state
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut SessionState {
        &mut self.entry.state
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.entry.last_touched = Instant::now();
    }
}

pub struct SessionStore {
    config: SessionStoreConfig,
    sessions: RwLock<HashMap<String, SharedEntry>>,
}

impl SessionStore {
    pub fn new(config: SessionStoreConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Lock a session, creating default state if it is absent
    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        loop {
            let entry = self.entry(session_id).await;
            let guard = entry.clone().lock_owned().await;

            // The entry may have been evicted while we waited for it
            let current = {
                let sessions = self.sessions.read().await;
                sessions
                    .get(session_id)
                    .is_some_and(|stored| Arc::ptr_eq(stored, &entry))
            };
            if current {
                return SessionGuard { entry: guard };
            }
            debug!("Session {} was evicted while waiting, retrying", session_id);
        }
    }

    /// Snapshot of a session's state (default if absent)
    pub async fn get(&self, session_id: &str) -> SessionState {
        self.lock(session_id).await.clone()
    }

    /// Replace a session's state
    pub async fn put(&self, session_id: &str, state: SessionState) {
        let mut guard = self.lock(session_id).await;
        *guard = state;
    }

    /// Drop a session's state. Returns true if the session existed.
    pub async fn remove(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Evict sessions idle for longer than `ttl`. Sessions with a turn in
    /// progress are kept.
    pub async fn cleanup_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let initial_count = sessions.len();

        sessions.retain(|_, entry| match entry.try_lock() {
            Ok(entry) => entry.last_touched.elapsed() <= ttl,
            Err(_) => true,
        });

        let removed = initial_count - sessions.len();
        if removed > 0 {
            info!("Evicted {} idle sessions", removed);
        }
        removed
    }

    async fn entry(&self, session_id: &str) -> SharedEntry {
        {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(session_id) {
                return entry.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get(session_id) {
            return entry.clone();
        }

        if sessions.len() >= self.config.max_sessions {
            Self::evict_oldest(&mut sessions);
        }

        let entry = Arc::new(Mutex::new(SessionEntry::new()));
        sessions.insert(session_id.to_string(), entry.clone());
        entry
    }

    fn evict_oldest(sessions: &mut HashMap<String, SharedEntry>) {
        let oldest = sessions
            .iter()
            .filter_map(|(id, entry)| {
                entry
                    .try_lock()
                    .ok()
                    .map(|entry| (id.clone(), entry.last_touched))
            })
            .min_by_key(|(_, touched)| *touched)
            .map(|(id, _)| id);

        if let Some(id) = oldest {
            debug!("Session capacity reached, evicting {}", id);
            sessions.remove(&id);
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionStoreConfig::default())
    }
}
