// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Retrieval-mode pagination and the continue command

use futures::stream::{self, StreamExt};
use retrieval_gateway::relay::StreamFragment;
use retrieval_gateway::turn::{
    RetrievalSession, TurnConfig, TurnRequest, NO_MORE_RESULTS_MESSAGE, NO_PREVIOUS_QUERY_MESSAGE,
};
use std::sync::Arc;

use crate::common::{hi_there_backend, Harness, ScriptedIndex};

async fn run(session: &Arc<RetrievalSession>, request: TurnRequest) -> Vec<StreamFragment> {
    session.handle_turn(request).collect().await
}

fn texts(fragments: &[StreamFragment]) -> Vec<&str> {
    fragments.iter().filter_map(|f| f.as_text()).collect()
}

fn footer(pages: std::ops::Range<usize>) -> String {
    pages
        .map(|i| format!("Source: doc{}.pdf | Page: {}", i, i))
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_first_turn_streams_answer_then_footer() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    let fragments = run(&harness.session, TurnRequest::new("s1", "leave policy")).await;

    assert_eq!(
        texts(&fragments),
        vec!["Hi", " there", footer(0..3).as_str()]
    );
    assert_eq!(fragments.last(), Some(&StreamFragment::Done));
    assert_eq!(harness.index.search_count(), 1);
    assert_eq!(harness.store.get("s1").await.cursor, 3);
}

#[tokio::test]
async fn test_continue_pages_through_results() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;
    let session = &harness.session;

    run(session, TurnRequest::new("s1", "leave policy")).await;

    let second = run(session, TurnRequest::new("s1", "continue")).await;
    assert_eq!(texts(&second).last().copied(), Some(footer(3..6).as_str()));
    assert_eq!(harness.store.get("s1").await.cursor, 6);

    let third = run(session, TurnRequest::new("s1", "  Continue ")).await;
    assert_eq!(texts(&third).last().copied(), Some(footer(6..9).as_str()));
    assert_eq!(harness.store.get("s1").await.cursor, 9);

    let fourth = run(session, TurnRequest::new("s1", "continue")).await;
    assert_eq!(
        fourth,
        vec![StreamFragment::text(NO_MORE_RESULTS_MESSAGE), StreamFragment::Done]
    );

    // One search for the whole sequence, and no generation once exhausted
    assert_eq!(harness.index.search_count(), 1);
    assert_eq!(harness.backend.request_count(), 3);
}

#[tokio::test]
async fn test_ten_results_end_with_single_record_batch() {
    let harness = Harness::new(ScriptedIndex::with_hits(10), hi_there_backend()).await;
    let session = &harness.session;

    run(session, TurnRequest::new("s1", "leave policy")).await;
    run(session, TurnRequest::new("s1", "continue")).await;
    run(session, TurnRequest::new("s1", "continue")).await;
    assert_eq!(harness.store.get("s1").await.cursor, 9);

    // Cursor 9 of 10 still has one record left
    let fourth = run(session, TurnRequest::new("s1", "continue")).await;
    assert_eq!(texts(&fourth), vec!["Hi", " there", footer(9..10).as_str()]);
    assert_eq!(fourth.last(), Some(&StreamFragment::Done));
    assert_eq!(harness.store.get("s1").await.cursor, 12);

    let fifth = run(session, TurnRequest::new("s1", "continue")).await;
    assert_eq!(
        fifth,
        vec![StreamFragment::text(NO_MORE_RESULTS_MESSAGE), StreamFragment::Done]
    );
    assert_eq!(harness.index.search_count(), 1);
    assert_eq!(harness.backend.request_count(), 4);
}

#[tokio::test]
async fn test_continue_context_carries_current_batch() {
    let harness = Harness::new(ScriptedIndex::with_hits(6), hi_there_backend()).await;

    run(&harness.session, TurnRequest::new("s1", "leave policy")).await;
    run(&harness.session, TurnRequest::new("s1", "continue")).await;

    let request = harness.backend.last_request().unwrap();
    let prompt = &request.messages[1].content;
    assert!(prompt.contains("File: doc3.pdf\nPage: 3\nText: passage 3"));
    assert!(prompt.contains("\n---\n"));
    assert!(!prompt.contains("doc0.pdf"));
    assert!(prompt.ends_with("answer for user question leave policy"));
}

#[tokio::test]
async fn test_partial_last_batch() {
    let harness = Harness::new(ScriptedIndex::with_hits(4), hi_there_backend()).await;

    run(&harness.session, TurnRequest::new("s1", "leave policy")).await;
    let second = run(&harness.session, TurnRequest::new("s1", "continue")).await;

    assert_eq!(texts(&second).last().copied(), Some(footer(3..4).as_str()));
    assert_eq!(harness.store.get("s1").await.cursor, 6);
}

#[tokio::test]
async fn test_continue_without_previous_query() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    let fragments = run(&harness.session, TurnRequest::new("fresh", "continue")).await;

    assert_eq!(
        fragments,
        vec![StreamFragment::text(NO_PREVIOUS_QUERY_MESSAGE), StreamFragment::Done]
    );
    assert_eq!(harness.index.search_count(), 0);
    assert_eq!(harness.backend.request_count(), 0);
}

#[tokio::test]
async fn test_repeated_query_starts_over() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    run(&harness.session, TurnRequest::new("s1", "leave policy")).await;
    run(&harness.session, TurnRequest::new("s1", "continue")).await;
    let again = run(&harness.session, TurnRequest::new("s1", "leave policy")).await;

    assert_eq!(texts(&again).last().copied(), Some(footer(0..3).as_str()));
    assert_eq!(harness.index.search_count(), 2);
    assert_eq!(harness.store.get("s1").await.cursor, 3);
}

#[tokio::test]
async fn test_empty_result_set_streams_answer_without_footer() {
    let harness = Harness::new(ScriptedIndex::with_hits(0), hi_there_backend()).await;

    let fragments = run(&harness.session, TurnRequest::new("s1", "leave policy")).await;
    assert_eq!(texts(&fragments), vec!["Hi", " there"]);
    assert_eq!(fragments.last(), Some(&StreamFragment::Done));

    let next = run(&harness.session, TurnRequest::new("s1", "continue")).await;
    assert_eq!(next[0], StreamFragment::text(NO_MORE_RESULTS_MESSAGE));
}

#[tokio::test]
async fn test_filter_applied_to_search() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    let request = TurnRequest::new("s1", "leave policy").with_file_filter(["doc2.pdf", "doc4.pdf"]);
    let fragments = run(&harness.session, request).await;

    let filter = harness.index.last_filter().unwrap();
    assert_eq!(filter.len(), 2);
    assert!(filter.contains("doc2.pdf"));
    assert_eq!(
        texts(&fragments).last().copied(),
        Some("Source: doc2.pdf | Page: 2\nSource: doc4.pdf | Page: 4")
    );
}

#[tokio::test]
async fn test_filter_change_on_continue_reruns_last_query() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    run(&harness.session, TurnRequest::new("s1", "leave policy")).await;
    let request = TurnRequest::new("s1", "continue").with_file_filter(["doc5.pdf"]);
    let fragments = run(&harness.session, request).await;

    assert_eq!(harness.index.search_count(), 2);
    assert_eq!(
        texts(&fragments).last().copied(),
        Some("Source: doc5.pdf | Page: 5")
    );
    let state = harness.store.get("s1").await;
    assert_eq!(state.last_query.as_deref(), Some("leave policy"));
    assert_eq!(state.cursor, 3);
    assert!(state.last_filter.contains("doc5.pdf"));
}

#[tokio::test]
async fn test_same_filter_on_continue_keeps_paging() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    run(&harness.session, TurnRequest::new("s1", "leave policy")).await;
    let request = TurnRequest::new("s1", "continue").with_file_filter(Vec::<String>::new());
    run(&harness.session, request).await;

    assert_eq!(harness.index.search_count(), 1);
    assert_eq!(harness.store.get("s1").await.cursor, 6);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;

    run(&harness.session, TurnRequest::new("a", "leave policy")).await;
    run(&harness.session, TurnRequest::new("a", "continue")).await;
    let other = run(&harness.session, TurnRequest::new("b", "continue")).await;

    assert_eq!(other[0], StreamFragment::text(NO_PREVIOUS_QUERY_MESSAGE));
    assert_eq!(harness.store.get("a").await.cursor, 6);
}

#[tokio::test]
async fn test_concurrent_continues_get_distinct_batches() {
    let harness = Harness::new(ScriptedIndex::with_hits(9), hi_there_backend()).await;
    run(&harness.session, TurnRequest::new("s1", "leave policy")).await;

    let turns = (0..2).map(|_| run(&harness.session, TurnRequest::new("s1", "continue")));
    let results: Vec<Vec<StreamFragment>> = stream::iter(turns).buffer_unordered(2).collect().await;

    let mut footers: Vec<String> = results
        .iter()
        .filter_map(|fragments| texts(fragments).last().map(|s| s.to_string()))
        .collect();
    footers.sort();
    assert_eq!(footers, vec![footer(3..6), footer(6..9)]);
    assert_eq!(harness.store.get("s1").await.cursor, 9);
}

#[tokio::test]
async fn test_custom_batch_size() {
    let config = TurnConfig {
        batch_size: 2,
        search_limit: 4,
        ..TurnConfig::default()
    };
    let harness =
        Harness::with_config(ScriptedIndex::with_hits(9), hi_there_backend(), config).await;

    run(&harness.session, TurnRequest::new("s1", "leave policy")).await;
    run(&harness.session, TurnRequest::new("s1", "continue")).await;
    let third = run(&harness.session, TurnRequest::new("s1", "continue")).await;

    assert_eq!(third[0], StreamFragment::text(NO_MORE_RESULTS_MESSAGE));
    assert_eq!(harness.store.get("s1").await.results.len(), 4);
}
