// Query pipeline: embed the question, retrieve chunks, generate an answer

pub mod prompt;


use tracing::{debug, info, warn};

use crate::config::{Config, RetrievalConfig};
use crate::database::{ChunkMetadata, SearchResult, VectorStore};
use crate::embeddings::Embedder;
use crate::llm::{ApiKey, ChatGenerator};
use crate::session::Turn;
use crate::{QaError, Result};

pub use prompt::PromptBuilder;

/// A generated answer and the chunks it was conditioned on
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    /// Retrieved chunks, most similar first
    pub sources: Vec<SearchResult>,
}

impl Answer {
    /// Distinct page numbers of the sources in retrieval order
    #[inline]
    pub fn source_pages(&self) -> Vec<u32> {
        let mut pages = Vec::new();
        for page in self
            .sources
            .iter()
            .filter_map(|s| s.chunk_metadata.page_number)
        {
            if !pages.contains(&page) {
                pages.push(page);
            }
        }
        pages
    }
}

pub struct QueryPipeline<E, G> {
    store: VectorStore,
    embedder: E,
    generator: G,
    retrieval: RetrievalConfig,
    prompt: PromptBuilder,
}

impl<E: Embedder, G: ChatGenerator> QueryPipeline<E, G> {
    /// Open the indexed store read-only and wire up the pipeline
    #[inline]
    pub async fn open(config: &Config, embedder: E, generator: G) -> Result<Self> {
        let store = VectorStore::open_for_read(config).await?;
        Self::new(store, embedder, generator, config)
    }

    #[inline]
    pub fn new(store: VectorStore, embedder: E, generator: G, config: &Config) -> Result<Self> {
        if embedder.dimension() != store.vector_dimension() {
            return Err(QaError::DimensionMismatch {
                store: store.vector_dimension(),
                configured: embedder.dimension(),
            });
        }

        Ok(Self {
            store,
            embedder,
            generator,
            retrieval: config.retrieval.clone(),
            prompt: PromptBuilder::new(config.document.title.clone())
                .with_history(config.session.include_history),
        })
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    #[inline]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// The `top_k` chunks most similar to the question
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        let text = format!("{}{}", self.retrieval.query_prefix, question);
        let query_vector = self
            .embedder
            .embed_query(&text)
            .map_err(|e| QaError::Embedding(format!("{e:#}")))?;

        let results = self
            .store
            .search_similar(&query_vector, self.retrieval.top_k)
            .await?;

        if results.is_empty() {
            warn!("No chunks retrieved for question, answering without context");
        } else {
            debug!(
                "Retrieved {} chunks, best similarity {:.3}",
                results.len(),
                results[0].similarity_score
            );
        }
        Ok(results)
    }

    /// Answer a question
    ///
    /// Fails with [`QaError::MissingCredential`] before any embedding or
    /// network call when no key is given.
    #[inline]
    pub async fn ask(
        &self,
        question: &str,
        history: &[Turn],
        api_key: Option<&ApiKey>,
    ) -> Result<Answer> {
        let api_key = api_key.ok_or(QaError::MissingCredential)?;

        let sources = self.retrieve(question).await?;
        let documents: Vec<&ChunkMetadata> = sources.iter().map(|s| &s.chunk_metadata).collect();
        let messages = self.prompt.build(question, &documents, history);

        let text = self.generator.generate(&messages, api_key)?;
        info!(
            "Answered with {} ({} sources)",
            self.generator.model_name(),
            sources.len()
        );

        Ok(Answer { text, sources })
    }
}
