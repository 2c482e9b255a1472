// Indexer module
// Load -> clean -> split -> embed -> write, strictly in sequence


use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::{
    AccessMode, Database, EmbeddingRecord, NewIndexedDocument, VectorStore,
};
use crate::document::{
    Chunk, EmbeddedChunk, clean_documents, loader, split_documents,
};
use crate::embeddings::Embedder;
use crate::{QaError, Result};

/// Rows handed to LanceDB per insert
const WRITE_BATCH_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOptions {
    /// Drop the vector table and clear the manifest before writing
    pub recreate: bool,
}

/// Statistics about one indexing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingStats {
    pub pages_loaded: usize,
    pub pages_with_text: usize,
    pub chunks_written: usize,
    /// The same file content had been indexed before this run
    pub previously_indexed: bool,
    pub duration: Duration,
}

/// Turns a PDF into vector store entries
pub struct Indexer<E> {
    config: Config,
    embedder: E,
    database: Database,
    show_progress: bool,
}

impl<E: Embedder> Indexer<E> {
    #[inline]
    pub async fn new(config: Config, embedder: E) -> Result<Self> {
        let database = Database::initialize_from_config_dir(config.get_base_dir())
            .await
            .map_err(|e| QaError::Database(format!("{e:#}")))?;

        Ok(Self {
            config,
            embedder,
            database,
            show_progress: console::user_attended_stderr(),
        })
    }

    /// Disable the terminal progress bar
    #[inline]
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Index the configured PDF
    #[inline]
    pub async fn index_configured(&self, options: IndexOptions) -> Result<IndexingStats> {
        let path = self.config.document.pdf_path.clone();
        self.index_file(&path, options).await
    }

    /// Run the full pipeline for one PDF
    ///
    /// Nothing is written until every chunk has been embedded, so a failure
    /// in any stage leaves the store as it was.
    #[inline]
    pub async fn index_file(&self, path: &Path, options: IndexOptions) -> Result<IndexingStats> {
        let started = Instant::now();
        info!("Indexing {}", path.display());

        self.check_embedder_dimension()?;
        if !options.recreate {
            self.check_existing_store().await?;
        }

        let bytes = loader::read_source(path)?;
        let file_hash = loader::fingerprint(&bytes);
        let documents = loader::load_pdf_bytes(&bytes, &path.display().to_string())?;
        let pages_with_text = documents.iter().filter(|d| !d.is_blank()).count();

        let cleaned = clean_documents(&documents);
        let chunks = split_documents(&cleaned, &self.config.chunking)
            .map_err(|e| QaError::Config(format!("{e:#}")))?;
        info!(
            "Split {} pages into {} chunks",
            documents.len(),
            chunks.len()
        );
        if chunks.is_empty() {
            warn!("{} has no extractable text, nothing will be indexed", path.display());
        }

        let embedded = self.embed_chunks(chunks)?;

        let previous_runs = self
            .database
            .find_by_hash(&file_hash)
            .await
            .map_err(|e| QaError::Database(format!("{e:#}")))?;
        let previously_indexed = !previous_runs.is_empty();
        if previously_indexed && !options.recreate {
            warn!(
                "{} was already indexed {} time(s); its chunks will be stored again. Use --recreate for a clean index",
                path.display(),
                previous_runs.len()
            );
        }

        let store = if options.recreate {
            info!("Recreating vector store and manifest");
            let store = VectorStore::recreate_for_write(&self.config).await?;
            self.database
                .clear_manifest()
                .await
                .map_err(|e| QaError::Database(format!("{e:#}")))?;
            store
        } else {
            VectorStore::open_for_write(&self.config).await?
        };
        debug!("Writing chunks to {}", store.path().display());

        let chunks_written = write_records(&store, &embedded).await?;
        if chunks_written > 0 {
            if let Err(e) = store.optimize().await {
                warn!("Vector store optimization failed: {}", e);
            }
        }

        self.database
            .record_indexed_document(NewIndexedDocument {
                source_path: path.display().to_string(),
                file_hash,
                title: self.config.document.title.clone(),
                page_count: documents.len() as i64,
                chunk_count: chunks_written as i64,
                embedding_model: self.embedder.model_name().to_string(),
                embedding_dimension: self.embedder.dimension() as i64,
            })
            .await
            .map_err(|e| QaError::Database(format!("{e:#}")))?;

        let stats = IndexingStats {
            pages_loaded: documents.len(),
            pages_with_text,
            chunks_written,
            previously_indexed,
            duration: started.elapsed(),
        };
        info!(
            "Indexed {} chunks from {} pages in {:.1?}",
            stats.chunks_written, stats.pages_loaded, stats.duration
        );
        Ok(stats)
    }

    fn check_embedder_dimension(&self) -> Result<()> {
        let configured = self.config.ollama.embedding_dimension as usize;
        if self.embedder.dimension() != configured {
            return Err(QaError::Embedding(format!(
                "Embedder {} produces {}-dimensional vectors but ollama.embedding_dimension is {}",
                self.embedder.model_name(),
                self.embedder.dimension(),
                configured
            )));
        }
        Ok(())
    }

    /// Fail before the expensive stages when an existing store was built
    /// with another dimension
    async fn check_existing_store(&self) -> Result<()> {
        match VectorStore::open_for_read(&self.config).await {
            Ok(_) | Err(QaError::StoreNotIndexed(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let batch_size = (self.config.ollama.batch_size as usize).max(1);
        let bar = self.progress_bar(chunks.len() as u64);

        let mut embedded = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .embedder
                .embed_texts(&texts)
                .map_err(|e| QaError::Embedding(format!("{e:#}")))?;

            if vectors.len() != batch.len() {
                return Err(QaError::Embedding(format!(
                    "Expected {} embeddings, received {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            for (chunk, embedding) in batch.iter().zip(vectors) {
                if embedding.len() != self.embedder.dimension() {
                    return Err(QaError::Embedding(format!(
                        "Received a {}-dimensional vector, expected {}",
                        embedding.len(),
                        self.embedder.dimension()
                    )));
                }
                embedded.push(EmbeddedChunk {
                    chunk: chunk.clone(),
                    embedding,
                });
            }

            bar.inc(batch.len() as u64);
            debug!("Embedded {}/{} chunks", embedded.len(), chunks.len());
        }

        bar.finish_and_clear();
        Ok(embedded)
    }

    fn progress_bar(&self, length: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} Embedding chunks")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        ProgressBar::new(length).with_style(style)
    }
}

async fn write_records(store: &VectorStore, embedded: &[EmbeddedChunk]) -> Result<usize> {
    debug_assert_eq!(store.mode(), AccessMode::ReadWrite);

    let created_at = Utc::now().to_rfc3339();
    let mut written = 0;
    for batch in embedded.chunks(WRITE_BATCH_SIZE) {
        let records = batch
            .iter()
            .map(|e| EmbeddingRecord::from_embedded(e, &created_at))
            .collect();
        written += store.store_embeddings_batch(records).await?;
    }
    Ok(written)
}
