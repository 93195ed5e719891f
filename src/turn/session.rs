// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-turn orchestration
//!
//! A turn runs in two phases. Preparation gates the input, resolves
//! new-query versus continue under the session lock, slices the batch and
//! builds the context. Generation then relays the upstream answer and
//! appends the citation footer. The session lock is released before
//! generation starts.

use async_stream::stream;
use futures::stream::{BoxStream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::context::{
    build_context, citation_footer, is_continue_command, passage_context, CHAT_PERSONA,
    NO_MORE_RESULTS_MESSAGE, NO_PREVIOUS_QUERY_MESSAGE, NO_UPLOADED_DOCUMENT_MESSAGE,
    REFUSAL_MESSAGE,
};
use super::errors::TurnError;
use super::request::{TurnMode, TurnRequest};
use crate::relay::{StreamFragment, StreamRelay};
use crate::retrieval::{EvidenceRetriever, SourceFilter, UploadedDocuments};
use crate::safety::{ModerationVerdict, SafetyGate};
use crate::session::SessionStore;

/// Fragment stream of one turn; always ends with `Done` or `Failed`
pub type TurnStream = BoxStream<'static, StreamFragment>;

#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Records surfaced per turn
    pub batch_size: usize,
    /// Hits requested per new query
    pub search_limit: usize,
    /// Passages taken from an uploaded document
    pub upload_top_k: usize,
    /// Bound on a whole turn, preparation and generation together
    pub turn_deadline: Option<Duration>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            search_limit: 15,
            upload_top_k: 3,
            turn_deadline: None,
        }
    }
}

/// Outcome of the preparation phase
#[derive(Debug, Clone, PartialEq)]
pub enum TurnPlan {
    /// Answer with one fixed fragment, no generation
    Reply(&'static str),
    /// Generate an answer, then append `citations` when present
    Generate {
        question: String,
        context: String,
        citations: Option<String>,
    },
}

pub struct RetrievalSession {
    gate: Arc<SafetyGate>,
    retriever: Arc<EvidenceRetriever>,
    store: Arc<SessionStore>,
    relay: Arc<StreamRelay>,
    uploads: Arc<UploadedDocuments>,
    config: TurnConfig,
}

impl RetrievalSession {
    pub fn new(
        gate: Arc<SafetyGate>,
        retriever: Arc<EvidenceRetriever>,
        store: Arc<SessionStore>,
        relay: Arc<StreamRelay>,
        uploads: Arc<UploadedDocuments>,
        config: TurnConfig,
    ) -> Self {
        Self {
            gate,
            retriever,
            store,
            relay,
            uploads,
            config,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn retriever(&self) -> &Arc<EvidenceRetriever> {
        &self.retriever
    }

    pub fn uploads(&self) -> &Arc<UploadedDocuments> {
        &self.uploads
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Run one turn.
    ///
    /// Never fails: errors become an `Error occurred: ...` fragment followed
    /// by `Failed`. Dropping the stream abandons the turn and closes the
    /// upstream connection.
    pub fn handle_turn(self: &Arc<Self>, request: TurnRequest) -> TurnStream {
        let this = Arc::clone(self);

        Box::pin(stream! {
            info!(
                "Turn started: session={} mode={} uploaded={}",
                request.session_id, request.mode, request.use_uploaded_document
            );
            let deadline = this.config.turn_deadline.map(|limit| Instant::now() + limit);

            let plan = match this.within(deadline, this.prepare(&request)).await {
                Ok(plan) => plan,
                Err(e) => {
                    warn!(
                        "Turn failed for session {} [{}] (retryable: {}): {}",
                        request.session_id,
                        e.error_code(),
                        e.is_retryable(),
                        e
                    );
                    yield StreamFragment::Text(e.user_message());
                    yield StreamFragment::Failed(e.to_string());
                    return;
                }
            };

            let (question, context, citations) = match plan {
                TurnPlan::Reply(message) => {
                    yield StreamFragment::text(message);
                    yield StreamFragment::Done;
                    return;
                }
                TurnPlan::Generate { question, context, citations } => (question, context, citations),
            };

            let mut fragments = this.relay.generate(&question, &context);
            loop {
                let next = match this.within(deadline, async { Ok(fragments.next().await) }).await {
                    Ok(next) => next,
                    Err(e) => {
                        warn!("Turn timed out for session {}: {}", request.session_id, e);
                        yield StreamFragment::Text(e.user_message());
                        yield StreamFragment::Failed(e.to_string());
                        return;
                    }
                };

                match next {
                    Some(StreamFragment::Text(text)) => yield StreamFragment::Text(text),
                    Some(StreamFragment::Done) | None => break,
                    Some(StreamFragment::Failed(cause)) => {
                        let e = TurnError::Generation(cause);
                        warn!("Generation failed for session {}: {}", request.session_id, e);
                        yield StreamFragment::Text(e.user_message());
                        yield StreamFragment::Failed(e.to_string());
                        return;
                    }
                }
            }

            if let Some(footer) = citations.filter(|footer| !footer.is_empty()) {
                yield StreamFragment::Text(footer);
            }
            yield StreamFragment::Done;
            debug!("Turn finished: session={}", request.session_id);
        })
    }

    /// Gate, resolve the session state and build the generation inputs
    pub async fn prepare(&self, request: &TurnRequest) -> Result<TurnPlan, TurnError> {
        if let ModerationVerdict::Blocked(reason) = self.gate.evaluate(&request.user_input).await? {
            info!(
                "Turn refused for session {}: blocked by {}",
                request.session_id, reason
            );
            return Ok(TurnPlan::Reply(REFUSAL_MESSAGE));
        }

        if request.use_uploaded_document {
            return self.prepare_uploaded(request).await;
        }

        match request.mode {
            TurnMode::Retrieval => self.prepare_retrieval(request).await,
            TurnMode::Chat => self.prepare_chat(request).await,
        }
    }

    async fn prepare_retrieval(&self, request: &TurnRequest) -> Result<TurnPlan, TurnError> {
        let filter = SourceFilter::new(request.file_filter.iter().cloned())?;
        let mut session = self.store.lock(&request.session_id).await;

        let question = if is_continue_command(&request.user_input) {
            let Some(last_query) = session.last_query.clone().filter(|q| !q.is_empty()) else {
                return Ok(TurnPlan::Reply(NO_PREVIOUS_QUERY_MESSAGE));
            };

            if !filter.is_empty() && filter != session.last_filter {
                // Same question under a different filter is a new query
                debug!(
                    "Filter changed for session {}, re-running '{}'",
                    request.session_id, last_query
                );
                let results = self
                    .retriever
                    .search(&last_query, &filter, self.config.search_limit)
                    .await?;
                session.begin_query(&last_query, filter, results);
            } else if session.is_exhausted() {
                return Ok(TurnPlan::Reply(NO_MORE_RESULTS_MESSAGE));
            }
            last_query
        } else {
            let results = self
                .retriever
                .search(&request.user_input, &filter, self.config.search_limit)
                .await?;
            session.begin_query(&request.user_input, filter, results);
            request.user_input.clone()
        };

        let start = session.cursor;
        let batch = session.next_batch(self.config.batch_size);
        debug!(
            "Session {}: batch of {} at cursor {} -> {} ({} results)",
            request.session_id,
            batch.len(),
            start,
            session.cursor,
            session.results.len()
        );
        drop(session);

        Ok(TurnPlan::Generate {
            question,
            context: build_context(&batch),
            citations: Some(citation_footer(&batch)),
        })
    }

    async fn prepare_chat(&self, request: &TurnRequest) -> Result<TurnPlan, TurnError> {
        let mut session = self.store.lock(&request.session_id).await;

        let question = if is_continue_command(&request.user_input) {
            let Some(last_query) = session.last_query.clone().filter(|q| !q.is_empty()) else {
                return Ok(TurnPlan::Reply(NO_PREVIOUS_QUERY_MESSAGE));
            };
            // Chat keeps no results, so a remembered chat question is always exhausted
            if session.is_exhausted() {
                return Ok(TurnPlan::Reply(NO_MORE_RESULTS_MESSAGE));
            }
            last_query
        } else {
            session.begin_chat(&request.user_input);
            request.user_input.clone()
        };

        Ok(TurnPlan::Generate {
            question,
            context: CHAT_PERSONA.to_string(),
            citations: None,
        })
    }

    async fn prepare_uploaded(&self, request: &TurnRequest) -> Result<TurnPlan, TurnError> {
        let Some(index) = self.uploads.get(&request.user_name).await else {
            return Ok(TurnPlan::Reply(NO_UPLOADED_DOCUMENT_MESSAGE));
        };

        let records = self
            .retriever
            .search_in(
                index.as_ref(),
                &request.user_input,
                &SourceFilter::default(),
                self.config.upload_top_k,
            )
            .await?;

        Ok(TurnPlan::Generate {
            question: request.user_input.clone(),
            context: passage_context(&records),
            citations: None,
        })
    }

    async fn within<T, F>(&self, deadline: Option<Instant>, future: F) -> Result<T, TurnError>
    where
        F: Future<Output = Result<T, TurnError>>,
    {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, future)
                .await
                .map_err(|_| {
                    TurnError::Timeout(
                        self.config
                            .turn_deadline
                            .map(|d| d.as_millis() as u64)
                            .unwrap_or_default(),
                    )
                })?,
            None => future.await,
        }
    }
}
