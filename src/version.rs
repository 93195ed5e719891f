// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the retrieval gateway

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-retrieval-gateway-2025-11-03";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-11-03";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "moderation-gate",
    "semantic-moderation",
    "paginated-retrieval",
    "continue-command",
    "direct-chat",
    "uploaded-documents",
    "streaming-relay",
    "citation-footer",
    "per-session-serialisation",
    "source-list-ttl-cache",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Retrieval Gateway {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for API responses
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
