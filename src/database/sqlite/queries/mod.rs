
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

const SELECT_COLUMNS: &str = "SELECT id, source_path, file_hash, title, page_count, chunk_count, \
     embedding_model, embedding_dimension, indexed_date FROM indexed_documents";

pub struct IndexedDocumentQueries;

impl IndexedDocumentQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_doc: NewIndexedDocument) -> Result<IndexedDocument> {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO indexed_documents (source_path, file_hash, title, page_count, chunk_count, embedding_model, embedding_dimension, indexed_date) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_doc.source_path)
        .bind(&new_doc.file_hash)
        .bind(&new_doc.title)
        .bind(new_doc.page_count)
        .bind(new_doc.chunk_count)
        .bind(&new_doc.embedding_model)
        .bind(new_doc.embedding_dimension)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to record indexed document")?
        .last_insert_rowid();

        debug!("Recorded indexing run {} for {}", id, new_doc.source_path);

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve recorded document"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<IndexedDocument>> {
        sqlx::query_as::<_, IndexedDocument>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get indexed document by id")
    }

    /// Every run for a file with this content hash, newest first
    #[inline]
    pub async fn find_by_hash(pool: &SqlitePool, file_hash: &str) -> Result<Vec<IndexedDocument>> {
        sqlx::query_as::<_, IndexedDocument>(&format!(
            "{SELECT_COLUMNS} WHERE file_hash = ? ORDER BY indexed_date DESC, id DESC"
        ))
        .bind(file_hash)
        .fetch_all(pool)
        .await
        .context("Failed to find indexed documents by hash")
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<IndexedDocument>> {
        sqlx::query_as::<_, IndexedDocument>(&format!(
            "{SELECT_COLUMNS} ORDER BY indexed_date ASC, id ASC"
        ))
        .fetch_all(pool)
        .await
        .context("Failed to list indexed documents")
    }

    #[inline]
    pub async fn latest(pool: &SqlitePool) -> Result<Option<IndexedDocument>> {
        sqlx::query_as::<_, IndexedDocument>(&format!(
            "{SELECT_COLUMNS} ORDER BY indexed_date DESC, id DESC LIMIT 1"
        ))
        .fetch_optional(pool)
        .await
        .context("Failed to get latest indexed document")
    }

    /// Remove every manifest row, returning how many were deleted
    #[inline]
    pub async fn delete_all(pool: &SqlitePool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM indexed_documents")
            .execute(pool)
            .await
            .context("Failed to clear indexed documents")?;
        Ok(result.rows_affected())
    }

    #[inline]
    pub async fn total_chunks(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(chunk_count), 0) FROM indexed_documents")
            .fetch_one(pool)
            .await
            .context("Failed to sum indexed chunks")
    }
}
