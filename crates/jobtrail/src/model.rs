//! Domain types shared across the pipeline: messages, applications and
//! their email history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage of an application.
///
/// The declaration order is the merge order: an automatic status update is
/// applied only when the new stage ranks strictly higher than the current
/// one. `Rejected` ranking highest encodes "most terminal", not "best
/// outcome".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Sent,
    Viewed,
    Interview,
    Offer,
    Rejected,
}

impl Status {
    /// Canonical wire/database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Sent => "SENT",
            Status::Viewed => "VIEWED",
            Status::Interview => "INTERVIEW",
            Status::Offer => "OFFER",
            Status::Rejected => "REJECTED",
        }
    }

    /// Parses a model-reported status, tolerating case and whitespace.
    /// Returns `None` for anything outside the stage enum (callers coerce
    /// to `Sent`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SENT" => Some(Status::Sent),
            "VIEWED" => Some(Status::Viewed),
            "INTERVIEW" => Some(Status::Interview),
            "OFFER" => Some(Status::Offer),
            "REJECTED" => Some(Status::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::parse(s).ok_or_else(|| format!("unknown status: '{}'", s))
    }
}

/// Presentation stage: either the stored status or the staleness-derived
/// `Ghosted` marker. Never persisted and never produced by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayStatus {
    Sent,
    Viewed,
    Interview,
    Offer,
    Rejected,
    Ghosted,
}

impl From<Status> for DisplayStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Sent => DisplayStatus::Sent,
            Status::Viewed => DisplayStatus::Viewed,
            Status::Interview => DisplayStatus::Interview,
            Status::Offer => DisplayStatus::Offer,
            Status::Rejected => DisplayStatus::Rejected,
        }
    }
}

/// Default staleness window after which a `Sent` application shows as
/// ghosted.
pub const DEFAULT_GHOST_THRESHOLD_DAYS: i64 = 14;

/// Computes the stage to display for an application. A `Sent` application
/// whose last update is older than `threshold` reads as `Ghosted`; every
/// other stage passes through unchanged.
pub fn display_status(
    status: Status,
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> DisplayStatus {
    if status == Status::Sent && now - updated_at > threshold {
        DisplayStatus::Ghosted
    } else {
        status.into()
    }
}

/// A message as delivered by the mailbox collaborator: headers resolved,
/// body already decoded to plain text. Immutable once fetched.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Provider-unique message identifier.
    pub id: String,
    /// Raw `From` header (display name plus address).
    pub from: String,
    pub subject: String,
    /// Decoded plain-text body.
    pub body: String,
    /// Short preview provided by the mailbox.
    pub snippet: String,
    pub received_at: DateTime<Utc>,
}

/// A tracked job application, owned by a user and unique-ish per
/// (user, company, position) under case-insensitive comparison.
#[derive(Debug, Clone, Serialize)]
pub struct Application {
    pub id: String,
    pub user_id: String,
    pub company: String,
    pub position: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One write-once history row per processed mailbox message.
#[derive(Debug, Clone, Serialize)]
pub struct EmailRecord {
    pub id: String,
    /// `None` means the message was noise or not job-related.
    pub application_id: Option<String>,
    /// Mailbox message id; unique, and the idempotency key for ingestion.
    pub message_id: String,
    pub subject: String,
    pub from: String,
    pub snippet: String,
    pub detected_status: Option<Status>,
    pub is_job_related: bool,
    pub received_at: DateTime<Utc>,
}

/// Fields for inserting an email record (ids and timestamps are assigned
/// by the store).
#[derive(Debug, Clone)]
pub struct NewEmailRecord {
    pub application_id: Option<String>,
    pub message_id: String,
    pub subject: String,
    pub from: String,
    pub snippet: String,
    pub detected_status: Option<Status>,
    pub is_job_related: bool,
    pub received_at: DateTime<Utc>,
}

impl NewEmailRecord {
    /// A suppressed record for a message that never reaches classification
    /// or was judged not job-related.
    pub fn suppressed(message: &RawMessage) -> Self {
        Self {
            application_id: None,
            message_id: message.id.clone(),
            subject: message.subject.clone(),
            from: message.from.clone(),
            snippet: message.snippet.clone(),
            detected_status: None,
            is_job_related: false,
            received_at: message.received_at,
        }
    }
}
