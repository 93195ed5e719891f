// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Fixed user-facing strings and grounding-context formatting

use crate::retrieval::EvidenceRecord;

pub const REFUSAL_MESSAGE: &str =
    "Sorry, I cannot process your request as it contains inappropriate or sensitive content.";
pub const NO_PREVIOUS_QUERY_MESSAGE: &str = "No previous query found. Please enter a new question.";
pub const NO_MORE_RESULTS_MESSAGE: &str = "No more results to display.";
pub const NO_UPLOADED_DOCUMENT_MESSAGE: &str =
    "No uploaded document found. Please upload a document first.";

/// Written after the last fragment of every turn
pub const END_OF_TURN_PADDING: &str = "      ";

pub const CONTINUE_COMMAND: &str = "continue";

/// Separates evidence entries in the grounding context
pub const CONTEXT_DELIMITER: &str = "\n---\n";

/// Context sent in direct-chat mode instead of retrieved evidence
pub const CHAT_PERSONA: &str = "You are a highly intelligent, helpful assistant designed to provide concise, neutral and respectful answers to user queries.

1. Provide information on any general topic, such as technology, science, business or history. Answers must be factual, clear and helpful. Neutral or positive questions about a company, its leadership, achievements, growth and history may be answered factually.
2. Refuse queries about violence, offensive language, political controversies, illegal activities, terrorism, racism or anything else that may harm a company's reputation.
3. If a sensitive topic is rephrased or disguised, still refuse it politely and explain that you cannot provide information on that topic.
4. Keep a professional, neutral and respectful tone. If a query is unclear, ask for clarification.
5. Do not suggest clicking \"Continue\" to explore further details.
6. Do not respond to requests for jokes or riddles.
7. Always respond in English only.

Verify every query against these guidelines before answering.";

/// True when the input is the literal continue command, ignoring case and
/// surrounding whitespace
pub fn is_continue_command(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(CONTINUE_COMMAND)
}

/// `File/Page/Text` entries for each record, in batch order
pub fn build_context(batch: &[EvidenceRecord]) -> String {
    batch
        .iter()
        .map(|record| {
            format!(
                "File: {}\nPage: {}\nText: {}",
                record.source_id, record.page, record.text
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

/// One `Source | Page` line per record, in batch order
pub fn citation_footer(batch: &[EvidenceRecord]) -> String {
    batch
        .iter()
        .map(|record| format!("Source: {} | Page: {}", record.source_id, record.page))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Uploaded-document context: passage texts only, one per line so that
/// adjacent passages do not run together
pub fn passage_context(records: &[EvidenceRecord]) -> String {
    records
        .iter()
        .map(|record| record.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
