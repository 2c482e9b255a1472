
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{ApiKey, ChatGenerator, ChatMessage};
use crate::config::OpenAiConfig;
use crate::http::{self, HttpError, RetryPolicy};
use crate::{QaError, Result};

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    endpoint: Url,
    model: String,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let base = config
            .endpoint()
            .map_err(|e| QaError::Config(e.to_string()))?;
        let endpoint = Url::parse(&format!(
            "{}/chat/completions",
            base.as_str().trim_end_matches('/')
        ))
        .map_err(|e| QaError::Config(format!("Invalid chat endpoint: {}", e)))?;

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            agent: http::agent_with_timeout(Duration::from_secs(config.timeout_seconds)),
            retry: RetryPolicy::default(),
        })
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

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl ChatGenerator for OpenAiClient {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate(&self, messages: &[ChatMessage], api_key: &ApiKey) -> Result<String> {
        let request_json = serde_json::to_string(&ChatRequest {
            model: &self.model,
            messages,
        })
        .map_err(|e| QaError::Generation(format!("Failed to serialize chat request: {}", e)))?;

        debug!(
            "Sending {} messages to {} ({})",
            messages.len(),
            self.endpoint,
            self.model
        );

        let authorization = format!("Bearer {}", api_key.expose());
        let body = self
            .retry
            .run(self.endpoint.as_str(), || {
                self.agent
                    .post(self.endpoint.as_str())
                    .header("Content-Type", "application/json")
                    .header("Authorization", authorization.as_str())
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .map_err(|e| match e {
                HttpError::Status(status @ (401 | 403)) => QaError::CredentialRejected(status),
                HttpError::Status(status) => {
                    QaError::Generation(format!("Chat completion failed with HTTP {}", status))
                }
                HttpError::Transport(message) => QaError::Network(message),
            })?;

        let response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| QaError::Generation(format!("Failed to parse chat response: {}", e)))?;

        if let Some(usage) = &response.usage {
            info!(
                "Chat completion used {} prompt and {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| QaError::Generation("Chat response contained no answer".to_string()))
    }
}
