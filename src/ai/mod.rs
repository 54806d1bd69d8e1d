//! Generative Backend Abstractions
//!
//! A small trait over the remote generative service: chat over a turn
//! history, one-shot multimodal generation, and the Files API used to
//! register large media before inference. [`gemini::GeminiClient`] is the
//! HTTP implementation; tests substitute scripted backends.

pub mod gemini;
#[cfg(test)]
pub(crate) mod mock;
pub mod types;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

pub use types::*;

/// Errors that can occur when talking to the generative backend
#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limit exceeded")]
    RateLimited { retry_after: Option<u64> },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("response blocked by safety filters: {0}")]
    Blocked(String),

    #[error("failed to parse API response: {0}")]
    ParseResponse(String),

    #[error("model returned no text")]
    EmptyResponse,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl GenAiError {
    /// Whether repeating the same idempotent call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenAiError::Network(_) | GenAiError::Timeout | GenAiError::RateLimited { .. } => true,
            GenAiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GenAiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenAiError::Timeout
        } else if e.is_decode() {
            GenAiError::ParseResponse(e.to_string())
        } else {
            GenAiError::Network(e.to_string())
        }
    }
}

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, GenAiError>;

/// Remote generative service.
///
/// Every method is a single remote round trip from the caller's point of
/// view; implementations may retry idempotent calls internally.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Send the full turn history and return the model's reply.
    async fn chat(&self, model: &str, turns: &[Turn]) -> Result<String>;

    /// Run one prompt plus zero or more media parts.
    async fn generate(&self, request: GenerateRequest) -> Result<String>;

    /// Register a local file with the remote Files service.
    ///
    /// Not idempotent: every call creates a new remote asset.
    async fn upload_file(&self, request: UploadRequest) -> Result<AssetHandle>;

    /// Query the current state of a registered file.
    async fn get_file(&self, name: &str) -> Result<AssetHandle>;
}

/// Bounded retry for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each later one
    pub base_delay: Duration,
}

/// Upper bound for a server-suggested `Retry-After`.
const MAX_RETRY_AFTER_SECS: u64 = 60;

impl RetryPolicy {
    /// Never retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32, error: &GenAiError) -> Duration {
        if let GenAiError::RateLimited {
            retry_after: Some(secs),
        } = error
        {
            return Duration::from_secs((*secs).min(MAX_RETRY_AFTER_SECS));
        }
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Run `f` until it succeeds, fails permanently, or the policy is exhausted.
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt, &e);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient backend failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Display name for an uploaded file, taken from its path.
pub fn display_name_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}
