#[cfg(test)]
mod tests;

use super::{ChunkMetadata, EmbeddingRecord};
use crate::{QaError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TABLE_NAME: &str = "chunks";

/// How a [`VectorStore`] handle may be used
///
/// Indexing opens the store read-write; question answering opens it
/// read-only and never creates or modifies anything on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Vector database store using LanceDB for cosine similarity search
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    table_name: String,
    vector_dimension: usize,
    mode: AccessMode,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    /// Cosine similarity, higher is better
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open the store configured for this data directory for indexing
    #[inline]
    pub async fn open_for_write(config: &Config) -> Result<Self, QaError> {
        Self::open(
            &config.vector_database_path(),
            config.ollama.embedding_dimension as usize,
            AccessMode::ReadWrite,
        )
        .await
    }

    /// Open the store configured for this data directory for querying
    #[inline]
    pub async fn open_for_read(config: &Config) -> Result<Self, QaError> {
        Self::open(
            &config.vector_database_path(),
            config.ollama.embedding_dimension as usize,
            AccessMode::ReadOnly,
        )
        .await
    }

    /// Open the vector store at `path`
    ///
    /// In read-write mode the directory and table are created when missing.
    /// In read-only mode a missing store is reported as
    /// [`QaError::StoreNotIndexed`]. Either way an existing table whose
    /// vectors differ from `dimension` is rejected with
    /// [`QaError::DimensionMismatch`].
    #[inline]
    pub async fn open(path: &Path, dimension: usize, mode: AccessMode) -> Result<Self, QaError> {
        debug!("Opening LanceDB at {:?} ({:?})", path, mode);

        match mode {
            AccessMode::ReadWrite => std::fs::create_dir_all(path).map_err(|e| {
                QaError::Database(format!("Failed to create vector database directory: {}", e))
            })?,
            AccessMode::ReadOnly if !path.is_dir() => {
                return Err(QaError::StoreNotIndexed(path.to_path_buf()));
            }
            AccessMode::ReadOnly => {}
        }

        let store = Self::connect(path, dimension, mode).await?;

        if store.table_exists().await? {
            let existing = store.detect_existing_vector_dimension().await?;
            if existing != dimension {
                return Err(QaError::DimensionMismatch {
                    store: existing,
                    configured: dimension,
                });
            }
            debug!("Opened existing table with {} dimensions", existing);
        } else if mode == AccessMode::ReadWrite {
            store.create_table().await?;
        } else {
            return Err(QaError::StoreNotIndexed(path.to_path_buf()));
        }

        Ok(store)
    }

    /// Open the configured store for a full re-index, discarding its contents
    #[inline]
    pub async fn recreate_for_write(config: &Config) -> Result<Self, QaError> {
        Self::recreate(
            &config.vector_database_path(),
            config.ollama.embedding_dimension as usize,
        )
        .await
    }

    /// Open `path` read-write with an empty table of `dimension`-wide vectors
    ///
    /// Any existing table is dropped before its schema is inspected, so a
    /// store built with another dimension can be rebuilt in place.
    #[inline]
    pub async fn recreate(path: &Path, dimension: usize) -> Result<Self, QaError> {
        std::fs::create_dir_all(path).map_err(|e| {
            QaError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let store = Self::connect(path, dimension, AccessMode::ReadWrite).await?;
        store.reset().await?;
        Ok(store)
    }

    async fn connect(path: &Path, dimension: usize, mode: AccessMode) -> Result<Self, QaError> {
        let uri = path.display().to_string();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            path: path.to_path_buf(),
            table_name: TABLE_NAME.to_string(),
            vector_dimension: dimension,
            mode,
        })
    }

    #[inline]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    #[inline]
    pub fn vector_dimension(&self) -> usize {
        self.vector_dimension
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn table_exists(&self) -> Result<bool, QaError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table, QaError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to open table: {}", e)))
    }

    async fn create_table(&self) -> Result<(), QaError> {
        let schema = self.create_schema();
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to create table: {}", e)))?;

        info!(
            "Created {} table with {} dimensions",
            self.table_name, self.vector_dimension
        );
        Ok(())
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize, QaError> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| QaError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                QaError::Database("Could not find vector column or determine dimension".to_string())
            })
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.vector_dimension as i32,
                ),
                false,
            ),
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("source_id", DataType::Utf8, false),
            Field::new("file_path", DataType::Utf8, false),
            Field::new("page_number", DataType::UInt32, true),
            Field::new("split_id", DataType::UInt32, false),
            Field::new("split_idx_start", DataType::UInt32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("word_count", DataType::UInt32, false),
            Field::new("meta", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    fn ensure_writable(&self) -> Result<(), QaError> {
        match self.mode {
            AccessMode::ReadWrite => Ok(()),
            AccessMode::ReadOnly => Err(QaError::Database(
                "Vector store was opened read-only".to_string(),
            )),
        }
    }

    /// Store embeddings in one batch, returning the number written
    #[inline]
    pub async fn store_embeddings_batch(
        &self,
        records: Vec<EmbeddingRecord>,
    ) -> Result<usize, QaError> {
        self.ensure_writable()?;

        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(0);
        }

        if let Some(bad) = records
            .iter()
            .find(|r| r.vector.len() != self.vector_dimension)
        {
            return Err(QaError::DimensionMismatch {
                store: self.vector_dimension,
                configured: bad.vector.len(),
            });
        }

        debug!("Storing batch of {} embeddings", records.len());

        let record_batch = self.create_record_batch(&records)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        self.open_table()
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Stored {} embeddings", records.len());
        Ok(records.len())
    }

    fn create_record_batch(&self, records: &[EmbeddingRecord]) -> Result<RecordBatch, QaError> {
        let len = records.len();

        let mut flat_values = Vec::with_capacity(len * self.vector_dimension);
        for record in records {
            flat_values.extend_from_slice(&record.vector);
        }
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.vector_dimension as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| QaError::Database(format!("Failed to create vector array: {}", e)))?;

        let metadata: Vec<&ChunkMetadata> = records.iter().map(|r| &r.metadata).collect();

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.id.as_str()),
            )),
            Arc::new(vector_array),
            Arc::new(StringArray::from_iter_values(
                metadata.iter().map(|m| m.chunk_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                metadata.iter().map(|m| m.source_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                metadata.iter().map(|m| m.file_path.as_str()),
            )),
            Arc::new(UInt32Array::from(
                metadata.iter().map(|m| m.page_number).collect::<Vec<_>>(),
            )),
            Arc::new(UInt32Array::from_iter_values(
                metadata.iter().map(|m| m.split_id),
            )),
            Arc::new(UInt32Array::from_iter_values(
                metadata.iter().map(|m| m.split_idx_start),
            )),
            Arc::new(StringArray::from_iter_values(
                metadata.iter().map(|m| m.content.as_str()),
            )),
            Arc::new(UInt32Array::from_iter_values(
                metadata.iter().map(|m| m.word_count),
            )),
            Arc::new(StringArray::from_iter_values(
                metadata.iter().map(|m| m.meta.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                metadata.iter().map(|m| m.created_at.as_str()),
            )),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| QaError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Return up to `limit` chunks ordered by descending cosine similarity
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, QaError> {
        if query_vector.len() != self.vector_dimension {
            return Err(QaError::DimensionMismatch {
                store: self.vector_dimension,
                configured: query_vector.len(),
            });
        }

        let table = self.open_table().await?;
        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| QaError::Database(format!("Failed to count rows: {}", e)))?;
        if rows == 0 {
            warn!("Vector store is empty, no context will be retrieved");
            return Ok(Vec::new());
        }

        debug!("Searching {} chunks with limit {}", rows, limit);

        let mut results = table
            .vector_search(query_vector)
            .map_err(|e| QaError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| QaError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(parse_search_batch(&batch)?);
        }

        search_results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        search_results.truncate(limit);

        debug!("Found {} similar chunks", search_results.len());
        Ok(search_results)
    }

    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64, QaError> {
        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| QaError::Database(format!("Failed to count rows: {}", e)))?;
        Ok(count as u64)
    }

    /// Drop every stored chunk and recreate an empty table
    #[inline]
    pub async fn reset(&self) -> Result<(), QaError> {
        self.ensure_writable()?;

        if self.table_exists().await? {
            info!("Dropping existing {} table", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| QaError::Database(format!("Failed to drop table: {}", e)))?;
        }

        self.create_table().await
    }

    /// Compact data files after a bulk write
    #[inline]
    pub async fn optimize(&self) -> Result<(), QaError> {
        self.ensure_writable()?;
        debug!("Optimizing vector database");

        self.open_table()
            .await?
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| QaError::Database(format!("Failed to optimize table: {}", e)))?;

        info!("Vector database optimization completed");
        Ok(())
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, QaError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| QaError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| QaError::Database(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, QaError> {
    let chunk_ids = column::<StringArray>(batch, "chunk_id")?;
    let source_ids = column::<StringArray>(batch, "source_id")?;
    let file_paths = column::<StringArray>(batch, "file_path")?;
    let page_numbers = column::<UInt32Array>(batch, "page_number")?;
    let split_ids = column::<UInt32Array>(batch, "split_id")?;
    let split_starts = column::<UInt32Array>(batch, "split_idx_start")?;
    let contents = column::<StringArray>(batch, "content")?;
    let word_counts = column::<UInt32Array>(batch, "word_count")?;
    let metas = column::<StringArray>(batch, "meta")?;
    let created_ats = column::<StringArray>(batch, "created_at")?;
    let distances = column::<Float32Array>(batch, "_distance").ok();

    let results = (0..batch.num_rows())
        .map(|row| {
            let distance = distances
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            SearchResult {
                chunk_metadata: ChunkMetadata {
                    chunk_id: chunk_ids.value(row).to_string(),
                    source_id: source_ids.value(row).to_string(),
                    file_path: file_paths.value(row).to_string(),
                    page_number: (!page_numbers.is_null(row)).then(|| page_numbers.value(row)),
                    split_id: split_ids.value(row),
                    split_idx_start: split_starts.value(row),
                    content: contents.value(row).to_string(),
                    word_count: word_counts.value(row),
                    meta: metas.value(row).to_string(),
                    created_at: created_ats.value(row).to_string(),
                },
                similarity_score: 1.0 - distance,
                distance,
            }
        })
        .collect();

    Ok(results)
}
