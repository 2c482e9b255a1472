use super::*;
use tempfile::TempDir;

const DIM: usize = 4;

fn record(id: &str, vector: [f32; DIM], page: u32) -> EmbeddingRecord {
    EmbeddingRecord {
        id: id.to_string(),
        vector: vector.to_vec(),
        metadata: ChunkMetadata {
            chunk_id: format!("chunk_{}", id),
            source_id: format!("page_{}", page),
            file_path: "magazine.pdf".to_string(),
            page_number: Some(page),
            split_id: 0,
            split_idx_start: 0,
            content: format!("Content of chunk {}", id),
            word_count: 4,
            meta: "{}".to_string(),
            created_at: "2025-04-01T00:00:00Z".to_string(),
        },
    }
}

async fn writable_store(temp_dir: &TempDir) -> VectorStore {
    VectorStore::open(&temp_dir.path().join("vectors"), DIM, AccessMode::ReadWrite)
        .await
        .expect("should open vector store")
}

#[tokio::test]
async fn read_write_open_creates_empty_table() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = writable_store(&temp_dir).await;

    assert_eq!(store.mode(), AccessMode::ReadWrite);
    assert_eq!(store.vector_dimension(), DIM);
    assert_eq!(store.count_embeddings().await.expect("should count"), 0);
}

#[tokio::test]
async fn read_only_open_of_missing_store_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("vectors");

    let result = VectorStore::open(&path, DIM, AccessMode::ReadOnly).await;
    assert!(matches!(result, Err(QaError::StoreNotIndexed(_))));
    assert!(!path.exists(), "read-only open must not create files");
}

#[tokio::test]
async fn read_only_handle_rejects_writes() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("vectors");
    drop(writable_store(&temp_dir).await);

    let store = VectorStore::open(&path, DIM, AccessMode::ReadOnly)
        .await
        .expect("should open read-only");

    let result = store
        .store_embeddings_batch(vec![record("1", [1.0, 0.0, 0.0, 0.0], 1)])
        .await;
    assert!(matches!(result, Err(QaError::Database(_))));
    assert!(store.reset().await.is_err());
    assert_eq!(store.count_embeddings().await.expect("should count"), 0);
}

#[tokio::test]
async fn store_and_count() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = writable_store(&temp_dir).await;

    let written = store
        .store_embeddings_batch(vec![
            record("1", [1.0, 0.0, 0.0, 0.0], 1),
            record("2", [0.0, 1.0, 0.0, 0.0], 2),
        ])
        .await
        .expect("should store embeddings");

    assert_eq!(written, 2);
    assert_eq!(store.count_embeddings().await.expect("should count"), 2);
    assert_eq!(
        store
            .store_embeddings_batch(Vec::new())
            .await
            .expect("empty batch is fine"),
        0
    );
}

#[tokio::test]
async fn wrong_vector_length_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = writable_store(&temp_dir).await;

    let mut bad = record("1", [1.0, 0.0, 0.0, 0.0], 1);
    bad.vector.push(0.5);

    let result = store.store_embeddings_batch(vec![bad]).await;
    assert!(matches!(
        result,
        Err(QaError::DimensionMismatch {
            store: 4,
            configured: 5
        })
    ));
}

#[tokio::test]
async fn reopening_with_other_dimension_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("vectors");
    drop(writable_store(&temp_dir).await);

    for mode in [AccessMode::ReadOnly, AccessMode::ReadWrite] {
        let result = VectorStore::open(&path, 8, mode).await;
        assert!(
            matches!(
                result,
                Err(QaError::DimensionMismatch {
                    store: 4,
                    configured: 8
                })
            ),
            "{mode:?} open should detect the mismatch"
        );
    }
}

#[tokio::test]
async fn search_orders_by_cosine_similarity() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = writable_store(&temp_dir).await;

    store
        .store_embeddings_batch(vec![
            record("far", [0.0, 0.0, 1.0, 0.0], 1),
            record("near", [0.9, 0.1, 0.0, 0.0], 2),
            record("middle", [0.5, 0.5, 0.0, 0.0], 3),
        ])
        .await
        .expect("should store embeddings");

    let results = store
        .search_similar(&[1.0, 0.0, 0.0, 0.0], 2)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].chunk_metadata.chunk_id, "chunk_near");
    assert_eq!(results[0].chunk_metadata.page_number, Some(2));
    assert_eq!(results[1].chunk_metadata.chunk_id, "chunk_middle");
    assert!(results[0].similarity_score > results[1].similarity_score);
    assert!(results[0].similarity_score > 0.9);
}

#[tokio::test]
async fn search_on_empty_store_returns_nothing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = writable_store(&temp_dir).await;

    let results = store
        .search_similar(&[1.0, 0.0, 0.0, 0.0], 10)
        .await
        .expect("search should succeed");
    assert!(results.is_empty());
}

#[tokio::test]
async fn search_rejects_wrong_query_dimension() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = writable_store(&temp_dir).await;

    let result = store.search_similar(&[1.0, 0.0], 10).await;
    assert!(matches!(result, Err(QaError::DimensionMismatch { .. })));
}

#[tokio::test]
async fn reset_clears_all_chunks() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = writable_store(&temp_dir).await;

    store
        .store_embeddings_batch(vec![record("1", [1.0, 0.0, 0.0, 0.0], 1)])
        .await
        .expect("should store embeddings");
    store.reset().await.expect("reset should succeed");

    assert_eq!(store.count_embeddings().await.expect("should count"), 0);
}

#[tokio::test]
async fn recreate_replaces_table_of_other_dimension() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("vectors");
    let old = writable_store(&temp_dir).await;
    old.store_embeddings_batch(vec![record("1", [1.0, 0.0, 0.0, 0.0], 1)])
        .await
        .expect("should store embeddings");
    drop(old);

    let store = VectorStore::recreate(&path, DIM * 2)
        .await
        .expect("recreate should ignore the old dimension");
    assert_eq!(store.mode(), AccessMode::ReadWrite);
    assert_eq!(store.count_embeddings().await.expect("should count"), 0);
    drop(store);

    let reopened = VectorStore::open(&path, DIM * 2, AccessMode::ReadOnly)
        .await
        .expect("store should now hold wider vectors");
    assert_eq!(reopened.vector_dimension(), DIM * 2);
    assert!(matches!(
        VectorStore::open(&path, DIM, AccessMode::ReadOnly).await,
        Err(QaError::DimensionMismatch { .. })
    ));
}

#[tokio::test]
async fn null_page_numbers_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = writable_store(&temp_dir).await;

    let mut pageless = record("1", [1.0, 0.0, 0.0, 0.0], 1);
    pageless.metadata.page_number = None;
    store
        .store_embeddings_batch(vec![pageless])
        .await
        .expect("should store embeddings");

    let results = store
        .search_similar(&[1.0, 0.0, 0.0, 0.0], 1)
        .await
        .expect("search should succeed");
    assert_eq!(results[0].chunk_metadata.page_number, None);
}
