// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod gateway;

pub use gateway::{EmbeddingConfig, GatewayConfig, ServerConfig, SessionConfig};
