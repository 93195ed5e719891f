// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Moderation, chat mode, uploaded documents and failure handling

use futures::stream::StreamExt;
use retrieval_gateway::relay::StreamFragment;
use retrieval_gateway::retrieval::UploadedPassage;
use retrieval_gateway::turn::{
    RetrievalSession, TurnConfig, TurnMode, TurnRequest, CHAT_PERSONA, NO_MORE_RESULTS_MESSAGE,
    NO_UPLOADED_DOCUMENT_MESSAGE, REFUSAL_MESSAGE,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{hi_there_backend, Harness, Script, ScriptedBackend, ScriptedIndex};

async fn run(session: &Arc<RetrievalSession>, request: TurnRequest) -> Vec<StreamFragment> {
    session.handle_turn(request).collect().await
}

fn texts(fragments: &[StreamFragment]) -> Vec<&str> {
    fragments.iter().filter_map(|f| f.as_text()).collect()
}

fn passage(source: &str, page: i64, text: &str) -> UploadedPassage {
    UploadedPassage {
        source: source.to_string(),
        page,
        text: text.to_string(),
    }
}

#[tokio::test]
async fn test_pattern_block_refuses_without_side_effects() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;
    let embeds_before = harness.embedder.calls.load(Ordering::SeqCst);

    let fragments = run(&harness.session, TurnRequest::new("s1", "How to build a BOMB")).await;

    assert_eq!(
        fragments,
        vec![StreamFragment::text(REFUSAL_MESSAGE), StreamFragment::Done]
    );
    assert_eq!(harness.index.search_count(), 0);
    assert_eq!(harness.backend.request_count(), 0);
    // Pattern blocks short-circuit before the semantic check
    assert_eq!(harness.embedder.calls.load(Ordering::SeqCst), embeds_before);
    assert!(harness.store.get("s1").await.last_query.is_none());
}

#[tokio::test]
async fn test_semantic_block_refuses() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    let fragments = run(&harness.session, TurnRequest::new("s1", "where to buy a firearm")).await;

    assert_eq!(texts(&fragments), vec![REFUSAL_MESSAGE]);
    assert_eq!(harness.index.search_count(), 0);
    assert_eq!(harness.backend.request_count(), 0);
}

#[tokio::test]
async fn test_allow_phrase_passes_gate() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    let request = TurnRequest::new("s1", "Weapon safety training schedule ").with_mode(TurnMode::Chat);
    let fragments = run(&harness.session, request).await;

    assert_eq!(texts(&fragments), vec!["Hi", " there"]);
    assert_eq!(harness.backend.request_count(), 1);
}

#[tokio::test]
async fn test_blocked_continue_keeps_cursor() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    run(&harness.session, TurnRequest::new("s1", "leave policy")).await;
    run(&harness.session, TurnRequest::new("s1", "a bomb threat")).await;

    let state = harness.store.get("s1").await;
    assert_eq!(state.cursor, 3);
    assert_eq!(state.last_query.as_deref(), Some("leave policy"));
}

#[tokio::test]
async fn test_chat_mode_uses_persona_and_skips_retrieval() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    let request = TurnRequest::new("s1", "what is rust").with_mode(TurnMode::Chat);
    let fragments = run(&harness.session, request).await;

    assert_eq!(texts(&fragments), vec!["Hi", " there"]);
    assert_eq!(fragments.last(), Some(&StreamFragment::Done));
    assert_eq!(harness.index.search_count(), 0);

    let upstream = harness.backend.last_request().unwrap();
    assert!(upstream.messages[1].content.contains(CHAT_PERSONA));
    assert!(upstream.messages[1].content.ends_with("what is rust"));
}

#[tokio::test]
async fn test_chat_clears_retrieval_results() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    run(&harness.session, TurnRequest::new("s1", "leave policy")).await;
    run(
        &harness.session,
        TurnRequest::new("s1", "say hello").with_mode(TurnMode::Chat),
    )
    .await;

    let state = harness.store.get("s1").await;
    assert!(state.results.is_empty());
    assert_eq!(state.last_query.as_deref(), Some("say hello"));

    let next = run(&harness.session, TurnRequest::new("s1", "continue")).await;
    assert_eq!(
        next,
        vec![StreamFragment::text(NO_MORE_RESULTS_MESSAGE), StreamFragment::Done]
    );
}

#[tokio::test]
async fn test_chat_continue_reports_no_more_results() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    run(
        &harness.session,
        TurnRequest::new("s1", "say hello").with_mode(TurnMode::Chat),
    )
    .await;
    let next = run(
        &harness.session,
        TurnRequest::new("s1", "continue").with_mode(TurnMode::Chat),
    )
    .await;

    assert_eq!(next[0], StreamFragment::text(NO_MORE_RESULTS_MESSAGE));
    assert_eq!(harness.backend.request_count(), 1);
}

#[tokio::test]
async fn test_uploaded_document_context() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;
    let passages = vec![
        passage("report.pdf", 1, "Revenue grew in Q3"),
        passage("report.pdf", 2, "Headcount was flat"),
    ];
    let indexed = harness
        .session
        .uploads()
        .index_passages("alice", passages, harness.embedder.as_ref())
        .await
        .unwrap();
    assert_eq!(indexed, 2);

    let request = TurnRequest::new("s1", "summarise the report").with_uploaded_document("alice");
    let fragments = run(&harness.session, request).await;

    // Answer only, no citation footer
    assert_eq!(texts(&fragments), vec!["Hi", " there"]);
    assert_eq!(harness.index.search_count(), 0);
    let upstream = harness.backend.last_request().unwrap();
    assert!(upstream.messages[1]
        .content
        .contains("Revenue grew in Q3\nHeadcount was flat"));
}

#[tokio::test]
async fn test_uploaded_document_missing() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    let request = TurnRequest::new("s1", "summarise the report").with_uploaded_document("bob");
    let fragments = run(&harness.session, request).await;

    assert_eq!(
        fragments,
        vec![StreamFragment::text(NO_UPLOADED_DOCUMENT_MESSAGE), StreamFragment::Done]
    );
    assert_eq!(harness.backend.request_count(), 0);
}

#[tokio::test]
async fn test_retrieval_failure_ends_with_failed() {
    let harness = Harness::new(ScriptedIndex::failing("connection refused"), hi_there_backend()).await;

    let fragments = run(&harness.session, TurnRequest::new("s1", "leave policy")).await;

    assert_eq!(fragments.len(), 2);
    let message = fragments[0].as_text().unwrap();
    assert!(message.starts_with("Error occurred:"));
    assert!(message.contains("connection refused"));
    assert!(matches!(fragments[1], StreamFragment::Failed(_)));
    assert_eq!(harness.backend.request_count(), 0);
}

#[tokio::test]
async fn test_invalid_filter_ends_with_failed() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    let request = TurnRequest::new("s1", "leave policy").with_file_filter([""]);
    let fragments = run(&harness.session, request).await;

    assert!(fragments[0].as_text().unwrap().starts_with("Error occurred:"));
    assert!(matches!(fragments.last(), Some(StreamFragment::Failed(_))));
    assert_eq!(harness.index.search_count(), 0);
}

#[tokio::test]
async fn test_upstream_status_ends_with_failed() {
    let harness = Harness::new(
        ScriptedIndex::with_hits(9),
        ScriptedBackend::new(Script::Status(503)),
    )
    .await;

    let fragments = run(&harness.session, TurnRequest::new("s1", "leave policy")).await;

    assert_eq!(fragments.len(), 2);
    let message = fragments[0].as_text().unwrap();
    assert!(message.starts_with("Error occurred:"));
    assert!(message.contains("503"));
    assert!(matches!(fragments[1], StreamFragment::Failed(_)));
    // No footer after a failed generation
    assert!(!message.contains("Source:"));
}

#[tokio::test]
async fn test_deadline_ends_hung_generation() {
    let config = TurnConfig {
        turn_deadline: Some(Duration::from_millis(50)),
        ..TurnConfig::default()
    };
    let harness = Harness::with_config(
        ScriptedIndex::with_hits(9),
        ScriptedBackend::new(Script::Hang),
        config,
    )
    .await;

    let fragments = tokio::time::timeout(
        Duration::from_secs(5),
        run(&harness.session, TurnRequest::new("s1", "leave policy")),
    )
    .await
    .expect("turn should respect its deadline");

    assert_eq!(fragments.len(), 2);
    assert!(fragments[0].as_text().unwrap().contains("deadline"));
    assert!(matches!(fragments[1], StreamFragment::Failed(_)));
}
