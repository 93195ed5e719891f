// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Aggregate gateway configuration

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::relay::UpstreamConfig;
use crate::retrieval::RetrievalConfig;
use crate::safety::SafetyConfig;
use crate::session::SessionStoreConfig;
use crate::turn::TurnConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sessions idle for longer are evicted by the sweeper
    pub idle_ttl: Duration,
    /// How often the sweeper runs
    pub sweep_interval: Duration,
    pub max_sessions: usize,
    /// Optional bound on a whole turn
    pub turn_deadline: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            max_sessions: 10_000,
            turn_deadline: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "all-MiniLM-L6-v2".to_string(),
            model_path: PathBuf::from("./models/all-MiniLM-L6-v2-onnx/model.onnx"),
            tokenizer_path: PathBuf::from("./models/all-MiniLM-L6-v2-onnx/tokenizer.json"),
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub safety: SafetyConfig,
    pub retrieval: RetrievalConfig,
    pub upstream: UpstreamConfig,
    pub session: SessionConfig,
    pub embedding: EmbeddingConfig,
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server: ServerConfig {
                listen_addr: parse_env("LISTEN_ADDR").unwrap_or(defaults.server.listen_addr),
            },
            safety: SafetyConfig::from_env(),
            retrieval: RetrievalConfig::from_env(),
            upstream: UpstreamConfig::from_env(),
            session: SessionConfig {
                idle_ttl: parse_env("SESSION_IDLE_TTL_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.session.idle_ttl),
                sweep_interval: parse_env("SESSION_SWEEP_INTERVAL_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.session.sweep_interval),
                max_sessions: parse_env("SESSION_MAX").unwrap_or(defaults.session.max_sessions),
                turn_deadline: parse_env("TURN_DEADLINE_SECS")
                    .filter(|secs: &u64| *secs > 0)
                    .map(Duration::from_secs),
            },
            embedding: EmbeddingConfig {
                model_name: env::var("EMBEDDING_MODEL_NAME").unwrap_or(defaults.embedding.model_name),
                model_path: env::var("EMBEDDING_MODEL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.embedding.model_path),
                tokenizer_path: env::var("EMBEDDING_TOKENIZER_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.embedding.tokenizer_path),
                dimension: parse_env("EMBEDDING_DIMENSION").unwrap_or(defaults.embedding.dimension),
            },
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        self.safety.validate()?;
        self.retrieval.validate()?;
        self.upstream.validate()?;
        if self.session.max_sessions == 0 {
            return Err("Session capacity must be greater than 0".to_string());
        }
        if self.session.sweep_interval.is_zero() {
            return Err("Session sweep interval must be greater than 0".to_string());
        }
        if self.embedding.dimension == 0 {
            return Err("Embedding dimension must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn turn_config(&self) -> TurnConfig {
        TurnConfig {
            batch_size: self.retrieval.batch_size,
            search_limit: self.retrieval.search_limit,
            upload_top_k: self.retrieval.upload_top_k,
            turn_deadline: self.session.turn_deadline,
        }
    }

    pub fn session_store_config(&self) -> SessionStoreConfig {
        SessionStoreConfig {
            max_sessions: self.session.max_sessions,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
