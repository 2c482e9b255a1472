// Document model and the text stages of the indexing pipeline:
// PDF loading, cleaning and word-window splitting

pub mod cleaner;
pub mod loader;
pub mod splitter;


use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub use cleaner::{clean_document, clean_documents};
pub use loader::load_pdf;
pub use splitter::{ChunkingConfig, split_document, split_documents};

/// Arbitrary metadata attached to documents and chunks
pub type Metadata = serde_json::Map<String, Value>;

pub const META_FILE_PATH: &str = "file_path";
pub const META_PAGE_NUMBER: &str = "page_number";

/// A unit of source content, one per PDF page after loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Content-derived identifier
    pub id: String,
    pub content: String,
    pub meta: Metadata,
}

impl Document {
    #[inline]
    pub fn new(content: String, meta: Metadata) -> Self {
        let id = content_id(&content, &meta);
        Self { id, content, meta }
    }

    /// Build a new document with different text but the same metadata
    #[inline]
    #[must_use]
    pub fn with_content(&self, content: String) -> Self {
        Self::new(content, self.meta.clone())
    }

    /// 1-based page the text came from, if known
    #[inline]
    pub fn page_number(&self) -> Option<u32> {
        page_number(&self.meta)
    }

    #[inline]
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// A bounded word window of a source document, the unit that gets embedded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    /// Id of the document this chunk was cut from
    pub source_id: String,
    /// Position of this chunk within its source document
    pub split_id: usize,
    /// Byte offset of the chunk within the source document's text
    pub split_idx_start: usize,
    pub word_count: usize,
    pub meta: Metadata,
}

impl Chunk {
    #[inline]
    pub fn page_number(&self) -> Option<u32> {
        page_number(&self.meta)
    }

    #[inline]
    pub fn file_path(&self) -> Option<&str> {
        self.meta.get(META_FILE_PATH).and_then(Value::as_str)
    }
}

/// A chunk paired with its embedding vector
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

fn page_number(meta: &Metadata) -> Option<u32> {
    meta.get(META_PAGE_NUMBER)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

/// SHA-256 over the content and its metadata, hex encoded
#[inline]
pub fn content_id(content: &str, meta: &Metadata) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(Value::Object(meta.clone()).to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
