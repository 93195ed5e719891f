// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Shared mocks for the integration suites
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use retrieval_gateway::embeddings::TextEmbedder;
use retrieval_gateway::relay::{
    ByteStream, CompletionBackend, CompletionRequest, RelayError, StreamRelay, UpstreamConfig,
};
use retrieval_gateway::retrieval::{
    EvidenceRetriever, IndexHit, RetrievalError, SearchRequest, SourceFilter, UploadedDocuments,
    VectorIndex,
};
use retrieval_gateway::safety::{ForbiddenVocabulary, SafetyConfig, SafetyGate};
use retrieval_gateway::session::{SessionStore, SessionStoreConfig};
use retrieval_gateway::turn::{RetrievalSession, TurnConfig};

/// Words that land on the threat axis
const THREAT_WORDS: &[&str] = &["weapon", "firearm", "explosive"];

/// Two-axis embedder: threat words on axis 0, everything else on axis 1
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextEmbedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        if THREAT_WORDS.iter().any(|w| lower.contains(w)) {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.0, 1.0])
        }
    }

    fn dimension(&self) -> usize {
        2
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Embedder that always fails
pub struct FailingEmbedder;

#[async_trait]
impl TextEmbedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("embedding service down")
    }

    fn dimension(&self) -> usize {
        2
    }

    fn model_name(&self) -> &str {
        "failing-test"
    }
}

/// Index returning a fixed hit list, recording every call
pub struct ScriptedIndex {
    hits: Vec<IndexHit>,
    fail_with: Option<String>,
    pub search_calls: AtomicUsize,
    pub filters: Mutex<Vec<SourceFilter>>,
    pub sources: Vec<String>,
    pub list_calls: AtomicUsize,
}

impl ScriptedIndex {
    /// `n` hits named `doc{i}.pdf`, page `i`, increasing distance
    pub fn with_hits(n: usize) -> Self {
        let hits = (0..n)
            .map(|i| IndexHit {
                distance: i as f32 * 0.1,
                source: format!("doc{}.pdf", i),
                page: i as i64,
                text: format!("passage {}", i),
            })
            .collect();
        Self {
            hits,
            fail_with: None,
            search_calls: AtomicUsize::new(0),
            filters: Mutex::new(Vec::new()),
            sources: vec!["doc0.pdf".to_string(), "doc1.pdf".to_string()],
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::with_hits(0)
        }
    }

    pub fn search_count(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn last_filter(&self) -> Option<SourceFilter> {
        self.filters.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Vec<IndexHit>>, RetrievalError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.filters.lock().unwrap().push(request.filter.clone());
        if let Some(message) = &self.fail_with {
            return Err(RetrievalError::IndexUnavailable(message.clone()));
        }
        let hits = self
            .hits
            .iter()
            .filter(|h| request.filter.contains(&h.source))
            .take(request.limit)
            .cloned()
            .collect();
        Ok(vec![hits])
    }

    async fn list_sources(&self) -> Result<Vec<String>, RetrievalError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.sources.clone())
    }

    fn collection(&self) -> &str {
        "test_collection"
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// What the scripted upstream does for each request
#[derive(Clone)]
pub enum Script {
    Chunks(Vec<&'static str>),
    /// Chunks that need not be valid UTF-8 on their own
    Raw(Vec<Vec<u8>>),
    Status(u16),
    /// Accept the request and never send a byte
    Hang,
}

/// Completion backend replaying a script, recording requests
pub struct ScriptedBackend {
    script: Script,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Upstream answering `words` as SSE deltas then `[DONE]`
    pub fn answering(words: &[&'static str]) -> Self {
        let mut chunks: Vec<&'static str> = words.to_vec();
        chunks.push("data: [DONE]\n\n");
        Self::new(Script::Chunks(chunks))
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn open_stream(&self, request: &CompletionRequest) -> Result<ByteStream, RelayError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.script {
            Script::Chunks(chunks) => {
                let chunks: Vec<Result<Bytes, RelayError>> = chunks
                    .iter()
                    .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                    .collect();
                Ok(stream::iter(chunks).boxed())
            }
            Script::Raw(chunks) => {
                let chunks: Vec<Result<Bytes, RelayError>> =
                    chunks.iter().map(|c| Ok(Bytes::from(c.clone()))).collect();
                Ok(stream::iter(chunks).boxed())
            }
            Script::Status(status) => Err(RelayError::UpstreamStatus {
                status: *status,
                body: "upstream says no".to_string(),
            }),
            Script::Hang => Ok(stream::pending().boxed()),
        }
    }
}

/// SSE line carrying one content delta
pub fn delta(text: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"delta": {"content": text}}]})
    )
}

/// Leak an owned string so it can sit in a `'static` script
pub fn leak(text: String) -> &'static str {
    Box::leak(text.into_boxed_str())
}

/// Upstream answering "Hi" and " there"
pub fn hi_there_backend() -> ScriptedBackend {
    ScriptedBackend::answering(&[leak(delta("Hi")), leak(delta(" there"))])
}

pub fn test_safety_config() -> SafetyConfig {
    SafetyConfig {
        threshold: 0.7,
        allow_phrases: vec!["weapon safety training".to_string()],
        blocked_patterns: vec![r"\bbomb\b".to_string()],
        forbidden_terms: vec!["weapon".to_string()],
    }
}

pub async fn test_gate(embedder: Arc<dyn TextEmbedder>) -> SafetyGate {
    let config = test_safety_config();
    let vocabulary = ForbiddenVocabulary::initialise(embedder.as_ref(), &config.forbidden_terms)
        .await
        .unwrap();
    SafetyGate::new(&config, Arc::new(vocabulary), embedder).unwrap()
}

/// A fully wired session plus handles on its mocks
pub struct Harness {
    pub session: Arc<RetrievalSession>,
    pub index: Arc<ScriptedIndex>,
    pub backend: Arc<ScriptedBackend>,
    pub embedder: Arc<KeywordEmbedder>,
    pub store: Arc<SessionStore>,
}

impl Harness {
    pub async fn new(index: ScriptedIndex, backend: ScriptedBackend) -> Self {
        Self::with_config(index, backend, TurnConfig::default()).await
    }

    pub async fn with_config(
        index: ScriptedIndex,
        backend: ScriptedBackend,
        config: TurnConfig,
    ) -> Self {
        let embedder = Arc::new(KeywordEmbedder::new());
        let index = Arc::new(index);
        let backend = Arc::new(backend);
        let store = Arc::new(SessionStore::new(SessionStoreConfig::default()));

        let gate = Arc::new(test_gate(embedder.clone()).await);
        let retriever = Arc::new(EvidenceRetriever::new(
            index.clone(),
            embedder.clone(),
            Duration::from_secs(60),
        ));
        let relay = Arc::new(StreamRelay::new(backend.clone(), UpstreamConfig::default()));
        let session = Arc::new(RetrievalSession::new(
            gate,
            retriever,
            store.clone(),
            relay,
            Arc::new(UploadedDocuments::default()),
            config,
        ));

        Self {
            session,
            index,
            backend,
            embedder,
            store,
        }
    }
}
