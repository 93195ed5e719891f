// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Parser;
use retrieval_gateway::{
    api::{start_server, AppState},
    config::GatewayConfig,
    embeddings::{OnnxEmbeddingModel, TextEmbedder},
    history::{HistoryStore, InMemoryHistoryStore},
    relay::{CompletionBackend, HttpCompletionBackend, StreamRelay},
    retrieval::{EvidenceRetriever, MilvusRestIndex, UploadedDocuments, VectorIndex},
    safety::{ForbiddenVocabulary, SafetyGate},
    session::SessionStore,
    turn::RetrievalSession,
};
use std::{env, net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{info, warn};

/// Conversational retrieval gateway
#[derive(Parser, Debug)]
#[command(name = "retrieval-gateway")]
#[command(version)]
#[command(about = "Moderated, paginated retrieval with streamed answers", long_about = None)]
struct Args {
    /// Address to listen on (overrides LISTEN_ADDR)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Chat-completions endpoint (overrides UPSTREAM_URL)
    #[arg(long)]
    upstream_url: Option<String>,

    /// Vector index base URL (overrides MILVUS_URL)
    #[arg(long)]
    index_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    info!("{}", retrieval_gateway::version::get_version_string());

    let mut config = GatewayConfig::from_env();
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    if let Some(url) = args.upstream_url {
        config.upstream.url = url;
    }
    if let Some(url) = args.index_url {
        config.retrieval.milvus.url = url;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    let embedding = &config.embedding;
    let embedder: Arc<dyn TextEmbedder> = Arc::new(
        OnnxEmbeddingModel::new(
            embedding.model_name.clone(),
            &embedding.model_path,
            &embedding.tokenizer_path,
            embedding.dimension,
        )
        .await
        .context("Failed to load embedding model")?,
    );

    let vocabulary = ForbiddenVocabulary::initialise(
        embedder.as_ref(),
        &config.safety.forbidden_terms,
    )
    .await?;
    let gate = Arc::new(SafetyGate::new(
        &config.safety,
        Arc::new(vocabulary),
        embedder.clone(),
    )?);
    info!(
        "Moderation gate ready: threshold {}, {} patterns",
        gate.threshold(),
        config.safety.blocked_patterns.len()
    );

    let index: Arc<dyn VectorIndex> =
        Arc::new(MilvusRestIndex::new(config.retrieval.milvus.clone())?);
    let retriever = Arc::new(EvidenceRetriever::new(
        index,
        embedder.clone(),
        Duration::from_secs(config.retrieval.source_cache_ttl_secs),
    ));
    info!(
        "Evidence retriever ready: {} (collection {})",
        config.retrieval.milvus.url,
        retriever.collection()
    );

    let backend: Arc<dyn CompletionBackend> =
        Arc::new(HttpCompletionBackend::new(&config.upstream)?);
    let relay = Arc::new(StreamRelay::new(backend, config.upstream.clone()));
    info!(
        "Stream relay ready: {} (model {})",
        config.upstream.url, config.upstream.model
    );

    let store = Arc::new(SessionStore::new(config.session_store_config()));
    let session = Arc::new(RetrievalSession::new(
        gate,
        retriever,
        store.clone(),
        relay,
        Arc::new(UploadedDocuments::default()),
        config.turn_config(),
    ));
    let history: Arc<dyn HistoryStore> = Arc::new(InMemoryHistoryStore::new());

    // Idle-session sweeper
    let idle_ttl = config.session.idle_ttl;
    let sweep_interval = config.session.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.cleanup_idle(idle_ttl).await;
            if removed > 0 {
                info!("Evicted {} idle sessions", removed);
            }
        }
    });

    let state = AppState {
        session,
        history,
        embedder,
    };
    let addr = config.server.listen_addr;

    tokio::select! {
        result = start_server(addr, state) => {
            if let Err(e) = &result {
                warn!("API server stopped: {}", e);
            }
            result
        }
        _ = signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}
