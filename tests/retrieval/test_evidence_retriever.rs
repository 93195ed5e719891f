// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// EvidenceRetriever over the in-memory index and scripted index

use retrieval_gateway::retrieval::{
    EvidenceRetriever, InMemoryIndex, IndexedPassage, RetrievalError, SourceFilter,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{FailingEmbedder, KeywordEmbedder, ScriptedIndex};

fn passage(source: &str, page: i64, vector: Vec<f32>) -> IndexedPassage {
    IndexedPassage {
        source: source.to_string(),
        page,
        text: format!("{} page {}", source, page),
        vector,
    }
}

fn memory_index() -> Arc<InMemoryIndex> {
    let index = InMemoryIndex::new("memory", 2, 100);
    index.add(passage("far.pdf", 1, vec![1.0, 0.0])).unwrap();
    index.add(passage("near.pdf", 2, vec![0.1, 1.0])).unwrap();
    index.add(passage("exact.pdf", 3, vec![0.0, 1.0])).unwrap();
    Arc::new(index)
}

#[tokio::test]
async fn test_results_ordered_by_distance() {
    let retriever = EvidenceRetriever::new(
        memory_index(),
        Arc::new(KeywordEmbedder::new()),
        Duration::from_secs(60),
    );

    let records = retriever
        .search("leave policy", &SourceFilter::default(), 10)
        .await
        .unwrap();

    let sources: Vec<&str> = records.iter().map(|r| r.source_id.as_str()).collect();
    assert_eq!(sources, vec!["exact.pdf", "near.pdf", "far.pdf"]);
    assert!(records[0].score <= records[1].score);
    assert_eq!(records[0].page, 3);
}

#[tokio::test]
async fn test_limit_and_filter() {
    let retriever = EvidenceRetriever::new(
        memory_index(),
        Arc::new(KeywordEmbedder::new()),
        Duration::from_secs(60),
    );

    let top = retriever
        .search("leave policy", &SourceFilter::default(), 1)
        .await
        .unwrap();
    assert_eq!(top.len(), 1);

    let filter = SourceFilter::new(["far.pdf"]).unwrap();
    let filtered = retriever.search("leave policy", &filter, 10).await.unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].source_id, "far.pdf");
}

#[tokio::test]
async fn test_empty_index_is_not_an_error() {
    let retriever = EvidenceRetriever::new(
        Arc::new(InMemoryIndex::new("empty", 2, 10)),
        Arc::new(KeywordEmbedder::new()),
        Duration::from_secs(60),
    );

    let records = retriever
        .search("anything", &SourceFilter::default(), 5)
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_embedding_failure_is_retrieval_error() {
    let index = Arc::new(ScriptedIndex::with_hits(3));
    let retriever = EvidenceRetriever::new(
        index.clone(),
        Arc::new(FailingEmbedder),
        Duration::from_secs(60),
    );

    let result = retriever.search("q", &SourceFilter::default(), 5).await;
    assert!(matches!(result, Err(RetrievalError::Embedding(_))));
    assert_eq!(index.search_count(), 0);
}

#[tokio::test]
async fn test_source_list_cache_expires() {
    let index = Arc::new(ScriptedIndex::with_hits(3));
    let retriever = EvidenceRetriever::new(
        index.clone(),
        Arc::new(KeywordEmbedder::new()),
        Duration::from_millis(30),
    );

    assert_eq!(retriever.list_sources().await.unwrap(), vec!["doc0.pdf", "doc1.pdf"]);
    retriever.list_sources().await.unwrap();
    assert_eq!(index.list_calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(60)).await;
    retriever.list_sources().await.unwrap();
    assert_eq!(index.list_calls.load(Ordering::SeqCst), 2);

    assert!(retriever.invalidate_sources());
    assert!(!retriever.invalidate_sources());
}
