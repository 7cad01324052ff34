//! Completion transport contract.
//!
//! The classifier owns retries and quota policy; a transport only issues
//! one request and reports failures with enough metadata to tell a
//! transient throttle from daily-quota exhaustion.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a completion backend.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The backend rejected the call for rate-limit reasons. The
    /// suggested retry delay, when the backend provides one, lets the
    /// caller distinguish a per-minute throttle from an exhausted daily
    /// quota.
    #[error("rate limited (suggested retry delay: {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The request could not be sent or the connection failed.
    #[error("completion request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("completion backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// The response arrived but did not contain a completion.
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

/// A single-shot prompt-to-text completion call.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, TransportError>;
}
