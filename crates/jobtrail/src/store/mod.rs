//! Storage contracts consumed by the reconciliation engine and the
//! mailbox, plus the SQLite implementation.

pub mod sqlite;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use thiserror::Error;

use crate::model::{Application, NewEmailRecord, Status};

pub use sqlite::SqliteStore;

/// Errors from storage operations. Note that a duplicate email record is
/// deliberately NOT an error — see [`InsertOutcome`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

/// Result of inserting an email record. `Duplicate` means a record with
/// the same mailbox message id already exists; callers treat it as
/// already-processed, never as a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Record storage and lookup for applications and their email history.
pub trait Store: Send + Sync {
    /// Case-insensitive exact match on company and position, scoped to
    /// the user.
    fn find_application(
        &self,
        user_id: &str,
        company: &str,
        position: &str,
    ) -> Result<Option<Application>, StoreError>;

    fn create_application(
        &self,
        user_id: &str,
        company: &str,
        position: &str,
        status: Status,
    ) -> Result<Application, StoreError>;

    fn update_application_status(&self, id: &str, status: Status) -> Result<(), StoreError>;

    /// Inserts a write-once email record keyed by mailbox message id.
    fn create_email_record(&self, record: NewEmailRecord) -> Result<InsertOutcome, StoreError>;

    /// Returns the subset of `message_ids` already present, so the
    /// mailbox can skip fetching them again.
    fn find_existing_message_ids(&self, message_ids: &[String])
        -> Result<Vec<String>, StoreError>;
}

/// An OAuth token pair held for a user. The refresh token never appears
/// in logs.
#[derive(Clone)]
pub struct StoredToken {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    /// Whether the access token has expired (with a safety margin so a
    /// token about to expire mid-request counts as expired).
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - chrono::Duration::seconds(30) <= now
    }
}

impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Credential persistence for the mailbox collaborator.
pub trait TokenStore: Send + Sync {
    fn load_token(&self, user_id: &str) -> Result<Option<StoredToken>, StoreError>;
    fn save_token(&self, token: &StoredToken) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry_includes_margin() {
        let now = Utc::now();
        let token = StoredToken {
            user_id: "u1".to_string(),
            access_token: "at".to_string(),
            refresh_token: SecretString::from("rt"),
            expires_at: now + chrono::Duration::seconds(10),
        };
        // Expires in 10s, margin is 30s: already considered expired.
        assert!(token.is_expired(now));

        let fresh = StoredToken {
            expires_at: now + chrono::Duration::seconds(3600),
            ..token
        };
        assert!(!fresh.is_expired(now));
    }

    #[test]
    fn test_token_debug_hides_refresh_token() {
        let token = StoredToken {
            user_id: "u1".to_string(),
            access_token: "at".to_string(),
            refresh_token: SecretString::from("super-secret"),
            expires_at: Utc::now(),
        };
        let debug = format!("{:?}", token);
        assert!(!debug.contains("super-secret"));
    }
}
