//! Mailbox collaborator contract.
//!
//! The pipeline consumes already-decoded plain-text messages; credential
//! refresh and payload decoding are the mailbox implementation's job.

pub mod gmail;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::RawMessage;

pub use gmail::GmailMailbox;

/// Errors from mailbox operations.
#[derive(Error, Debug)]
pub enum MailboxError {
    /// No usable credentials for the user; the account must be
    /// reconnected.
    #[error("no valid credentials for user '{0}'")]
    CredentialsMissing(String),

    /// The access token could not be refreshed.
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    /// The request could not be sent or the connection failed.
    #[error("mailbox request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("mailbox returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// A message payload could not be decoded.
    #[error("failed to decode message payload: {0}")]
    Decode(String),

    /// Storage failure while excluding already-seen messages.
    #[error("storage error: {0}")]
    Store(#[from] crate::store::StoreError),
}

/// Result type for mailbox operations.
pub type Result<T> = std::result::Result<T, MailboxError>;

/// Batch message access for one user's inbox.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Fetches up to `max_count` messages from the last `window_days`
    /// days that have no email record yet, oldest received first.
    async fn fetch_unseen(
        &self,
        user_id: &str,
        window_days: u32,
        max_count: usize,
    ) -> Result<Vec<RawMessage>>;
}
