// Chat-completion types, the API key wrapper and the generator seam

pub mod openai;


use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{QaError, Result};

pub use openai::OpenAiClient;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
const API_KEY_PREFIX: &str = "sk-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Credential for the chat-completion service
///
/// Held only in memory. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Accept a key that is non-empty and starts with `sk-`
    #[inline]
    pub fn parse(raw: &str) -> Result<Self> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(QaError::InvalidCredential("API key is empty".to_string()));
        }
        if !key.starts_with(API_KEY_PREFIX) {
            return Err(QaError::InvalidCredential(format!(
                "API key must start with '{API_KEY_PREFIX}'"
            )));
        }
        Ok(Self(key.to_string()))
    }

    /// Read the key from `OPENAI_API_KEY`
    ///
    /// An unset or empty variable yields `Ok(None)`; a malformed one is an error.
    #[inline]
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_optional(std::env::var(API_KEY_ENV).ok().as_deref())
    }

    #[inline]
    pub fn from_optional(raw: Option<&str>) -> Result<Option<Self>> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(key) => Self::parse(key).map(Some),
        }
    }

    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({API_KEY_PREFIX}***)")
    }
}

/// Produces an answer from a list of chat messages
pub trait ChatGenerator {
    fn model_name(&self) -> &str;

    fn generate(&self, messages: &[ChatMessage], api_key: &ApiKey) -> Result<String>;
}
