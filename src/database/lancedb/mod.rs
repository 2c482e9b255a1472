// LanceDB vector database module
// Stores chunk embeddings next to the chunk text and provenance


pub mod vector_store;

use serde::{Deserialize, Serialize};

use crate::document::{EmbeddedChunk, Metadata};

pub use vector_store::{AccessMode, SearchResult, VectorStore};

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Row key, a random UUID assigned at write time
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Chunk text and provenance stored alongside its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Content-derived id of the chunk
    pub chunk_id: String,
    /// Id of the page document the chunk was cut from
    pub source_id: String,
    pub file_path: String,
    /// 1-based page number, absent for sources without pages
    pub page_number: Option<u32>,
    pub split_id: u32,
    /// Byte offset of the chunk within its page text
    pub split_idx_start: u32,
    pub content: String,
    pub word_count: u32,
    /// Remaining chunk metadata as a JSON object
    pub meta: String,
    pub created_at: String,
}

impl ChunkMetadata {
    /// Parse the stored JSON metadata back into a map
    #[inline]
    pub fn meta_map(&self) -> Metadata {
        serde_json::from_str(&self.meta).unwrap_or_default()
    }
}

impl EmbeddingRecord {
    #[inline]
    pub fn from_embedded(embedded: &EmbeddedChunk, created_at: &str) -> Self {
        let chunk = &embedded.chunk;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector: embedded.embedding.clone(),
            metadata: ChunkMetadata {
                chunk_id: chunk.id.clone(),
                source_id: chunk.source_id.clone(),
                file_path: chunk.file_path().unwrap_or_default().to_string(),
                page_number: chunk.page_number(),
                split_id: saturating_u32(chunk.split_id),
                split_idx_start: saturating_u32(chunk.split_idx_start),
                content: chunk.content.clone(),
                word_count: saturating_u32(chunk.word_count),
                meta: serde_json::Value::Object(chunk.meta.clone()).to_string(),
                created_at: created_at.to_string(),
            },
        }
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
