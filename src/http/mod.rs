// Blocking HTTP helpers shared by the embedding and chat clients


use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HttpError {
    /// The server answered with a non-success status
    #[error("HTTP {0}")]
    Status(u16),
    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),
}

impl HttpError {
    #[inline]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(status) => Some(*status),
            Self::Transport(_) => None,
        }
    }
}

/// Retry schedule for idempotent requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Delay before the second attempt; doubles after every failure
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run `request_fn` until it succeeds, a client error occurs, or attempts run out
    ///
    /// Server errors (5xx) and transport failures are retried with exponential
    /// backoff. Client errors (4xx) are returned immediately.
    #[inline]
    pub fn run<F>(&self, target: &str, mut request_fn: F) -> Result<String, HttpError>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let attempts = self.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!("HTTP request attempt {}/{} to {}", attempt, attempts, target);

            let error = match request_fn() {
                Ok(body) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(body);
                }
                Err(error) => error,
            };

            let failure = match error {
                ureq::Error::StatusCode(status) if status >= 500 => {
                    warn!(
                        "Server error (status {}), attempt {}/{}",
                        status, attempt, attempts
                    );
                    HttpError::Status(status)
                }
                ureq::Error::StatusCode(status) => {
                    warn!("Client error (status {}), not retrying", status);
                    return Err(HttpError::Status(status));
                }
                ureq::Error::ConnectionFailed
                | ureq::Error::HostNotFound
                | ureq::Error::Timeout(_)
                | ureq::Error::Io(_) => {
                    warn!(
                        "Transport error: {}, attempt {}/{}",
                        error, attempt, attempts
                    );
                    HttpError::Transport(error.to_string())
                }
                other => {
                    warn!("Non-retryable error: {}", other);
                    return Err(HttpError::Transport(other.to_string()));
                }
            };
            last_error = Some(failure);

            if attempt < attempts {
                let delay = self.delay_after(attempt);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All retry attempts failed for request to {}", target);
        Err(last_error
            .unwrap_or_else(|| HttpError::Transport("request failed after retries".to_string())))
    }
}

/// Blocking agent with a global timeout
#[inline]
pub fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}
