// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Streaming relay from the upstream generation endpoint

pub mod client;
pub mod config;
pub mod sse;
pub mod types;

pub use client::{ByteStream, CompletionBackend, HttpCompletionBackend, StreamRelay};
pub use config::{UpstreamConfig, DEFAULT_SYSTEM_PROMPT};
pub use sse::{parse_line, LineDecoder, ParsedLine, MAX_PENDING_LINE};
pub use types::{ChatMessage, CompletionRequest, RelayError, StreamFragment};
