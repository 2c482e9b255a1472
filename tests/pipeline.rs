#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! End-to-end tests of indexing and answering with in-process fakes
//!
//! A generated three-page PDF is indexed into a temporary data directory,
//! then queried through the same pipeline the CLI uses.

mod common;

use std::collections::BTreeSet;

use magazine_qa::QaError;
use magazine_qa::database::{AccessMode, EmbeddingRecord, VectorStore};
use magazine_qa::document::{Chunk, EmbeddedChunk, Metadata};
use magazine_qa::indexer::{IndexOptions, Indexer};
use magazine_qa::query::QueryPipeline;
use magazine_qa::session::Session;
use serde_json::Value;
use tempfile::TempDir;

use common::{
    DIMENSION, EchoGenerator, HashingEmbedder, RIVER_PAGE, hashed_embedding, test_config,
    test_key, write_sample_magazine,
};

async fn indexed_pipeline(temp_dir: &TempDir) -> QueryPipeline<HashingEmbedder, EchoGenerator> {
    let config = test_config(temp_dir);
    let pdf = write_sample_magazine(temp_dir);

    let indexer = Indexer::new(config.clone(), HashingEmbedder)
        .await
        .expect("should create indexer")
        .quiet();
    let stats = indexer
        .index_file(&pdf, IndexOptions::default())
        .await
        .expect("indexing should succeed");
    assert_eq!(stats.pages_loaded, 3);
    assert_eq!(stats.pages_with_text, 3);

    QueryPipeline::open(&config, HashingEmbedder, EchoGenerator::default())
        .await
        .expect("pipeline should open")
}

#[tokio::test]
async fn indexed_magazine_answers_from_matching_page() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pipeline = indexed_pipeline(&temp_dir).await;

    let answer = pipeline
        .ask(
            "How many volunteers joined the river cleanup?",
            &[],
            Some(&test_key()),
        )
        .await
        .expect("ask should succeed");

    assert_eq!(
        answer.sources[0].chunk_metadata.page_number,
        Some(2),
        "river page should rank first"
    );
    assert_eq!(
        answer.text,
        "Answer to: How many volunteers joined the river cleanup?"
    );

    let calls = pipeline
        .generator()
        .calls
        .lock()
        .expect("lock should not be poisoned");
    let prompt = &calls[0].last().expect("user message").content;
    assert!(prompt.contains("[page 2]"));
    assert!(prompt.contains("two hundred volunteers"));
}

#[tokio::test]
async fn every_page_with_text_is_chunked() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pipeline = indexed_pipeline(&temp_dir).await;

    let count = pipeline
        .store()
        .count_embeddings()
        .await
        .expect("should count");
    assert!(count >= 3, "expected at least one chunk per page, got {count}");

    let results = pipeline
        .store()
        .search_similar(&hashed_embedding("anything"), 100)
        .await
        .expect("search should succeed");
    let pages: BTreeSet<u32> = results
        .iter()
        .filter_map(|r| r.chunk_metadata.page_number)
        .collect();
    assert_eq!(pages, BTreeSet::from([1, 2, 3]));
    assert!(
        results
            .iter()
            .all(|r| r.chunk_metadata.file_path.ends_with("magazine.pdf"))
    );
}

#[tokio::test]
async fn stored_chunk_ranks_first_for_its_own_embedding() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(
        &temp_dir.path().join("vectors"),
        DIMENSION,
        AccessMode::ReadWrite,
    )
    .await
    .expect("should open store");

    let texts = [
        "Forest walks resume in spring.",
        RIVER_PAGE,
        "Membership fees and printing costs.",
    ];
    let records: Vec<EmbeddingRecord> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let mut meta = Metadata::new();
            meta.insert("page_number".to_string(), Value::from(i + 1));
            let embedded = EmbeddedChunk {
                chunk: Chunk {
                    id: format!("chunk-{i}"),
                    content: (*text).to_string(),
                    source_id: format!("page-{i}"),
                    split_id: 0,
                    split_idx_start: 0,
                    word_count: text.split_whitespace().count(),
                    meta,
                },
                embedding: hashed_embedding(text),
            };
            EmbeddingRecord::from_embedded(&embedded, "2025-04-01T00:00:00Z")
        })
        .collect();
    store
        .store_embeddings_batch(records)
        .await
        .expect("should store");

    let results = store
        .search_similar(&hashed_embedding(RIVER_PAGE), 3)
        .await
        .expect("search should succeed");

    assert_eq!(results[0].chunk_metadata.content, RIVER_PAGE);
    assert!(results[0].similarity_score > 0.99);
    assert!(
        results
            .windows(2)
            .all(|pair| pair[0].similarity_score >= pair[1].similarity_score)
    );
}

#[tokio::test]
async fn session_keeps_only_the_last_ten_turns() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pipeline = indexed_pipeline(&temp_dir).await;
    let mut session = Session::new(10).with_api_key(Some(test_key()));

    for i in 1..=11 {
        session
            .ask(&pipeline, &format!("question {i} about the river"))
            .await
            .expect("ask should succeed");
    }

    let questions: Vec<String> = session
        .history()
        .iter()
        .map(|turn| turn.question.clone())
        .collect();
    let expected: Vec<String> = (2..=11).map(|i| format!("question {i} about the river")).collect();
    assert_eq!(questions, expected);
    assert!(session.history().render().starts_with("**Q1:** question 2 about the river"));
}

#[tokio::test]
async fn session_without_key_fails_and_keeps_history_empty() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let pipeline = indexed_pipeline(&temp_dir).await;
    let mut session = Session::new(10);

    let result = session.ask(&pipeline, "Who wrote the letter?").await;

    assert!(matches!(result, Err(QaError::MissingCredential)));
    assert!(session.history().is_empty());
    assert_eq!(pipeline.generator().call_count(), 0);

    session
        .set_credential("sk-now-present")
        .expect("key should be accepted");
    session
        .ask(&pipeline, "Who wrote the letter?")
        .await
        .expect("ask should succeed once a key is set");
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn querying_before_indexing_reports_store_not_indexed() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);

    let result = QueryPipeline::open(&config, HashingEmbedder, EchoGenerator::default()).await;

    assert!(matches!(result, Err(QaError::StoreNotIndexed(_))));
}

#[tokio::test]
async fn reindexing_duplicates_until_recreated() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let pdf = write_sample_magazine(&temp_dir);
    let indexer = Indexer::new(config.clone(), HashingEmbedder)
        .await
        .expect("should create indexer")
        .quiet();

    let first = indexer
        .index_file(&pdf, IndexOptions::default())
        .await
        .expect("first run should succeed");
    assert!(!first.previously_indexed);

    let second = indexer
        .index_file(&pdf, IndexOptions::default())
        .await
        .expect("second run should succeed");
    assert!(second.previously_indexed);

    let store = VectorStore::open_for_read(&config)
        .await
        .expect("store should exist");
    assert_eq!(
        store.count_embeddings().await.expect("should count"),
        (first.chunks_written * 2) as u64
    );
    drop(store);

    let rebuilt = indexer
        .index_file(&pdf, IndexOptions { recreate: true })
        .await
        .expect("recreate run should succeed");
    let store = VectorStore::open_for_read(&config)
        .await
        .expect("store should exist");
    assert_eq!(
        store.count_embeddings().await.expect("should count"),
        rebuilt.chunks_written as u64
    );

    let runs = indexer
        .database()
        .list_indexed_documents()
        .await
        .expect("should list runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].embedding_model, "hashing-test");
    assert_eq!(runs[0].page_count, 3);
}

#[tokio::test]
async fn recreate_rebuilds_store_of_other_dimension() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let pdf = write_sample_magazine(&temp_dir);
    drop(
        VectorStore::open(&config.vector_database_path(), 96, AccessMode::ReadWrite)
            .await
            .expect("should create old store"),
    );
    let indexer = Indexer::new(config.clone(), HashingEmbedder)
        .await
        .expect("should create indexer")
        .quiet();

    let plain = indexer.index_file(&pdf, IndexOptions::default()).await;
    assert!(matches!(
        plain,
        Err(QaError::DimensionMismatch {
            store: 96,
            configured: 64
        })
    ));

    let stats = indexer
        .index_file(&pdf, IndexOptions { recreate: true })
        .await
        .expect("recreate should rebuild the store");

    let store = VectorStore::open_for_read(&config)
        .await
        .expect("store should open with the new dimension");
    assert_eq!(store.vector_dimension(), DIMENSION);
    assert_eq!(
        store.count_embeddings().await.expect("should count"),
        stats.chunks_written as u64
    );
    let runs = indexer
        .database()
        .list_indexed_documents()
        .await
        .expect("should list runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].embedding_dimension, DIMENSION as i64);
}
