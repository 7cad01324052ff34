//! Builders for test messages and scripted model responses.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use jobtrail::model::RawMessage;

/// A message with the given id, sender and subject, received on a fixed
/// date offset by `day` so ordering is deterministic.
pub fn message(id: &str, from: &str, subject: &str, day: u32) -> RawMessage {
    RawMessage {
        id: id.to_string(),
        from: from.to_string(),
        subject: subject.to_string(),
        body: format!("Body of {}", subject),
        snippet: format!("Snippet of {}", subject),
        received_at: Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap(),
    }
}

/// A LinkedIn application confirmation (pre-filters as trusted).
pub fn linkedin_confirmation(id: &str, company: &str, day: u32) -> RawMessage {
    message(
        id,
        "LinkedIn <jobs-noreply@linkedin.com>",
        &format!("Your application was sent to {}", company),
        day,
    )
}

/// A consumer-platform newsletter (pre-filters as noise by domain).
pub fn newsletter(id: &str, day: u32) -> RawMessage {
    message(id, "Notion <newsletter@notion.so>", "Your weekly digest", day)
}

/// Mail from a sender no rule recognizes (goes to the unknown tier).
pub fn unknown_sender(id: &str, subject: &str, day: u32) -> RawMessage {
    message(id, "Someone <hello@smallco.example>", subject, day)
}

/// A well-formed extraction response from the model.
pub fn model_json(company: &str, position: &str, status: &str, confidence: f32) -> String {
    format!(
        r#"{{"isJobRelated": true, "company": "{}", "position": "{}", "status": "{}", "confidence": {}}}"#,
        company, position, status, confidence
    )
}

/// A not-job-related classification response.
pub fn model_unrelated() -> String {
    r#"{"isJobRelated": false, "company": "N/A", "position": "N/A", "status": "SENT", "confidence": 0.97}"#
        .to_string()
}
