
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{Embedder, normalize};
use crate::config::OllamaConfig;
use crate::http::{self, RetryPolicy};

pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm:latest";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    dimension: usize,
    normalize: bool,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    #[serde(rename = "input")]
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            dimension: config.embedding_dimension as usize,
            normalize: config.normalize_embeddings,
            agent: http::agent_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            retry: RetryPolicy::default(),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = http::agent_with_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry.attempts = attempts;
        self
    }

    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.retry.backoff = backoff;
        self
    }

    /// Test connection to Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let version = self.ping().context("Server ping failed")?;
        self.validate_model().context("Model validation failed")?;

        info!(
            "Health check passed for Ollama {} at {} with model {}",
            version, self.base_url, self.model
        );
        Ok(())
    }

    /// Ping the Ollama server, returning its version string
    #[inline]
    pub fn ping(&self) -> Result<String> {
        let url = self.endpoint("/api/version")?;
        debug!("Pinging Ollama server at {}", url);

        let body = self
            .retry
            .run(url.as_str(), || {
                self.agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to ping Ollama server")?;

        let version: VersionResponse =
            serde_json::from_str(&body).context("Failed to parse version response")?;
        Ok(version.version)
    }

    /// Validate that the configured model has been pulled
    #[inline]
    pub fn validate_model(&self) -> Result<()> {
        debug!("Validating model: {}", self.model);

        let models = self.list_models().context("Failed to list models")?;
        if models.iter().any(|m| m.name == self.model) {
            debug!("Model {} is available", self.model);
            return Ok(());
        }

        let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        warn!(
            "Model {} not found. Available models: {:?}",
            self.model, available
        );
        bail!(
            "Model '{}' is not available (try `ollama pull {}`). Available models: {:?}",
            self.model,
            self.model,
            available
        )
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;
        debug!("Fetching available models from {}", url);

        let body = self
            .retry
            .run(url.as_str(), || {
                self.agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let response: ModelsResponse =
            serde_json::from_str(&body).context("Failed to parse models response")?;

        debug!("Found {} models", response.models.len());
        Ok(response.models)
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint("/api/embed")?;
        let request_json = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            inputs: texts,
        })
        .context("Failed to serialize embedding request")?;

        let body = self
            .retry
            .run(url.as_str(), || {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate embeddings")?;

        let response: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;

        if response.embeddings.len() != texts.len() {
            bail!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            );
        }

        let mut embeddings = response.embeddings;
        for embedding in &mut embeddings {
            if embedding.len() != self.dimension {
                bail!(
                    "Model {} returned {}-dimensional vectors but {} were configured",
                    self.model,
                    embedding.len(),
                    self.dimension
                );
            }
            if self.normalize {
                normalize(embedding);
            }
        }

        Ok(embeddings)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {path}"))
    }
}

impl Embedder for OllamaClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            let vectors = self
                .embed_single_batch(batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;
            results.extend(vectors);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}
