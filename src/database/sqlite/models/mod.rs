
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A completed indexing run recorded in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IndexedDocument {
    pub id: i64,
    pub source_path: String,
    /// SHA-256 of the PDF bytes
    pub file_hash: String,
    pub title: String,
    pub page_count: i64,
    pub chunk_count: i64,
    pub embedding_model: String,
    pub embedding_dimension: i64,
    pub indexed_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIndexedDocument {
    pub source_path: String,
    pub file_hash: String,
    pub title: String,
    pub page_count: i64,
    pub chunk_count: i64,
    pub embedding_model: String,
    pub embedding_dimension: i64,
}

impl IndexedDocument {
    /// Short form of the file hash for display
    #[inline]
    pub fn short_hash(&self) -> &str {
        self.file_hash.get(..12).unwrap_or(&self.file_hash)
    }
}
