// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod embeddings;
pub mod history;
pub mod relay;
pub mod retrieval;
pub mod safety;
pub mod session;
pub mod turn;
pub mod version;

// Re-export main types
pub use config::GatewayConfig;
pub use history::{Feedback, HistoryEntry, HistoryStore, InMemoryHistoryStore, SessionBuckets};
pub use relay::{StreamFragment, StreamRelay};
pub use retrieval::{EvidenceRecord, EvidenceRetriever, SourceFilter};
pub use safety::{ModerationVerdict, SafetyGate};
pub use session::{SessionState, SessionStore};
pub use turn::{RetrievalSession, TurnMode, TurnRequest};
