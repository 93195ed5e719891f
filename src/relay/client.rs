// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Streaming relay over an OpenAI-compatible chat-completions endpoint

use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};

use super::config::UpstreamConfig;
use super::sse::{parse_line, LineDecoder, ParsedLine};
use super::types::{ChatMessage, CompletionRequest, RelayError, StreamFragment};

/// Raw response body as a stream of byte chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, RelayError>>;

/// Longest slice of a malformed line included in a diagnostic
const MAX_LOGGED_LINE: usize = 200;

/// Something that can open a streaming completion.
///
/// Dropping the returned stream must release the underlying connection.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send the request. A non-success status is `Err(UpstreamStatus)`.
    async fn open_stream(&self, request: &CompletionRequest) -> Result<ByteStream, RelayError>;
}

/// reqwest-backed [`CompletionBackend`]
pub struct HttpCompletionBackend {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpCompletionBackend {
    pub fn new(config: &UpstreamConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RelayError::Request(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn open_stream(&self, request: &CompletionRequest) -> Result<ByteStream, RelayError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RelayError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UpstreamStatus {
                status: status.as_u16(),
                body: truncate(&body, MAX_LOGGED_LINE).to_string(),
            });
        }

        debug!("Upstream stream opened ({})", status);
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| RelayError::Connection(e.to_string())))
            .boxed())
    }
}

/// Turns one upstream completion into an ordered fragment stream
pub struct StreamRelay {
    backend: Arc<dyn CompletionBackend>,
    config: UpstreamConfig,
}

impl StreamRelay {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: UpstreamConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Request body for a question and its grounding context
    pub fn build_request(&self, question: &str, context: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(self.config.system_prompt.clone()),
                ChatMessage::user(format!(
                    "Refer to the Context scrapped from Vector Database {} and answer for user question {}",
                    context, question
                )),
            ],
            stream: true,
            max_tokens: self.config.max_tokens,
        }
    }

    /// Stream the answer to `question`.
    ///
    /// Yields `Text` fragments then exactly one of `Done` or `Failed`. The
    /// stream is lazy: nothing is sent until it is first polled, and dropping
    /// it closes the upstream connection.
    pub fn generate(&self, question: &str, context: &str) -> BoxStream<'static, StreamFragment> {
        let backend = self.backend.clone();
        let request = self.build_request(question, context);

        Box::pin(stream! {
            let mut body = match backend.open_stream(&request).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Upstream generation failed to start: {}", e);
                    yield StreamFragment::Failed(e.to_string());
                    return;
                }
            };

            let mut decoder = LineDecoder::new();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("Upstream stream broke: {}", e);
                        yield StreamFragment::Failed(e.to_string());
                        return;
                    }
                };

                let lines = match decoder.push(&chunk) {
                    Ok(lines) => lines,
                    Err(e) => {
                        warn!("Upstream stream rejected: {}", e);
                        yield StreamFragment::Failed(e.to_string());
                        return;
                    }
                };
                for line in lines {
                    if let Some(fragment) = interpret(&line) {
                        let terminal = fragment.is_terminal();
                        yield fragment;
                        if terminal {
                            return;
                        }
                    }
                }
            }

            if let Some(line) = decoder.finish() {
                if let Some(fragment) = interpret(&line) {
                    let terminal = fragment.is_terminal();
                    yield fragment;
                    if terminal {
                        return;
                    }
                }
            }

            debug!("Upstream closed without [DONE]");
            yield StreamFragment::Done;
        })
    }
}

/// Map one line to the fragment it produces, if any
fn interpret(line: &str) -> Option<StreamFragment> {
    match parse_line(line) {
        ParsedLine::Skip => None,
        ParsedLine::Done => Some(StreamFragment::Done),
        ParsedLine::Delta(text) if text.is_empty() => None,
        ParsedLine::Delta(text) => Some(StreamFragment::Text(text)),
        ParsedLine::Malformed { raw, error } => {
            warn!(
                "Skipping malformed stream event: {} - data: {}",
                error,
                truncate(&raw, MAX_LOGGED_LINE)
            );
            None
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
