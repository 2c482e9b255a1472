use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{IndexedDocument, NewIndexedDocument};
use crate::database::sqlite::queries::IndexedDocumentQueries;


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// Index manifest: which PDFs were indexed, when, and with which model
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join("metadata.db")).await
    }

    #[inline]
    pub async fn record_indexed_document(
        &self,
        document: NewIndexedDocument,
    ) -> Result<IndexedDocument> {
        IndexedDocumentQueries::create(&self.pool, document).await
    }

    #[inline]
    pub async fn find_by_hash(&self, file_hash: &str) -> Result<Vec<IndexedDocument>> {
        IndexedDocumentQueries::find_by_hash(&self.pool, file_hash).await
    }

    #[inline]
    pub async fn list_indexed_documents(&self) -> Result<Vec<IndexedDocument>> {
        IndexedDocumentQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn latest_indexed_document(&self) -> Result<Option<IndexedDocument>> {
        IndexedDocumentQueries::latest(&self.pool).await
    }

    #[inline]
    pub async fn total_indexed_chunks(&self) -> Result<i64> {
        IndexedDocumentQueries::total_chunks(&self.pool).await
    }

    #[inline]
    pub async fn clear_manifest(&self) -> Result<u64> {
        let removed = IndexedDocumentQueries::delete_all(&self.pool).await?;
        info!("Cleared {} manifest entries", removed);
        Ok(removed)
    }
}
