// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! One conversational turn: gate, paginate, generate, cite

pub mod context;
pub mod errors;
pub mod request;
pub mod session;

pub use context::{
    build_context, citation_footer, is_continue_command, passage_context, CHAT_PERSONA,
    CONTEXT_DELIMITER, CONTINUE_COMMAND, END_OF_TURN_PADDING, NO_MORE_RESULTS_MESSAGE,
    NO_PREVIOUS_QUERY_MESSAGE, NO_UPLOADED_DOCUMENT_MESSAGE, REFUSAL_MESSAGE,
};
pub use errors::TurnError;
pub use request::{TurnMode, TurnRequest};
pub use session::{RetrievalSession, TurnConfig, TurnPlan, TurnStream};
