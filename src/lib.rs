use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("No API key configured for the chat-completion service")]
    MissingCredential,

    #[error("Invalid API key: {0}")]
    InvalidCredential(String),

    #[error("API key rejected by the chat-completion service (HTTP {0})")]
    CredentialRejected(u16),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error(
        "Embedding dimension mismatch: vector store holds {store}-dimensional vectors but {configured} were configured"
    )]
    DimensionMismatch { store: usize, configured: usize },

    #[error("Vector store at {} has not been indexed yet, run `magazine-qa index` first", .0.display())]
    StoreNotIndexed(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod http;
pub mod indexer;
pub mod llm;
pub mod query;
pub mod session;
