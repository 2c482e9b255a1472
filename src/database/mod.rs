// Database module
// SQLite holds the index manifest, LanceDB holds the chunk vectors

pub mod lancedb;
pub mod sqlite;

pub use self::lancedb::{AccessMode, ChunkMetadata, EmbeddingRecord, SearchResult, VectorStore};
pub use sqlite::models::{IndexedDocument, NewIndexedDocument};
pub use sqlite::{Database, DbPool};
