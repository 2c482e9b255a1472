// Embeddings module
// Ollama integration plus the embedder seam used by both pipelines

pub mod ollama;


use anyhow::Result;

pub use ollama::OllamaClient;

/// Turns text into fixed-dimension vectors
///
/// The indexing and query pipelines must use embedders with the same model
/// and dimension, otherwise similarity scores are meaningless.
pub trait Embedder {
    /// Identifier of the underlying model, recorded in the index manifest
    fn model_name(&self) -> &str;

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Embed texts, returning one vector per input in the same order
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string
    #[inline]
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedder returned no vector for the query"))
    }
}

/// Scale a vector to unit length; zero vectors are left untouched
#[inline]
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
