// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration for the upstream generation endpoint

use std::env;
use std::time::Duration;

/// Fixed system instruction sent with every generation request
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant designed to assist users by providing simple and clear answers to their questions.
INSTRUCTIONS:
- Context is generated from a database, so the user is not aware of it. Advise users to refer to the source for exact information, or prompt them to ask a more relevant query.
- Reduce the context within the thinking window.
- Do not show the source in your response, since it is given to the user directly.

Provide a concise response unless the user requests more details.";

/// Upstream chat-completions endpoint settings
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Full URL of the chat-completions endpoint
    pub url: String,
    pub model: String,
    /// Bound on generated tokens per answer
    pub max_tokens: u32,
    pub system_prompt: String,
    /// Optional bearer token
    pub api_key: Option<String>,
    /// Connection establishment timeout; the body itself is unbounded
    pub connect_timeout: Duration,
}

impl UpstreamConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("UPSTREAM_URL").unwrap_or(defaults.url),
            model: env::var("UPSTREAM_MODEL").unwrap_or(defaults.model),
            max_tokens: env::var("MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_tokens),
            system_prompt: env::var("UPSTREAM_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            api_key: env::var("UPSTREAM_API_KEY").ok().filter(|k| !k.is_empty()),
            connect_timeout: env::var("UPSTREAM_CONNECT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        reqwest::Url::parse(&self.url)
            .map_err(|e| format!("Invalid upstream URL '{}': {}", self.url, e))?;
        if self.max_tokens == 0 {
            return Err("Max tokens must be greater than 0".to_string());
        }
        if self.model.is_empty() {
            return Err("Upstream model must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/v1/chat/completions".to_string(),
            model: "tgi".to_string(),
            max_tokens: 1500,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}
