// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod files;
pub mod generate;
pub mod http_server;

pub use errors::{ApiError, ErrorResponse};
pub use files::{
    CommentRequest, FeedbackRequest, HistoryResponse, InvalidateResponse, SessionRemovedResponse,
    SourcesResponse, UploadRequest, UploadResponse, UserHistoryResponse,
};
pub use generate::{
    generate_handler, response_body, GenerateRequest, HISTORY_ID_HEADER, SESSION_ID_HEADER,
};
pub use http_server::{caller_identity, create_app, start_server, AppState, USER_NAME_HEADER};
