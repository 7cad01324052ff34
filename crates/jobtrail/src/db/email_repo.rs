//! Email record repository — write-once history rows keyed by the
//! mailbox message id.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// A raw email record row from the database.
#[derive(Debug, Clone)]
pub struct EmailRecordRow {
    pub id: String,
    pub application_id: Option<String>,
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub snippet: String,
    pub detected_status: Option<String>,
    pub is_job_related: bool,
    pub received_at: String,
}

fn row_from(row: &rusqlite::Row<'_>) -> Result<EmailRecordRow, rusqlite::Error> {
    Ok(EmailRecordRow {
        id: row.get(0)?,
        application_id: row.get(1)?,
        message_id: row.get(2)?,
        subject: row.get(3)?,
        sender: row.get(4)?,
        snippet: row.get(5)?,
        detected_status: row.get(6)?,
        is_job_related: row.get(7)?,
        received_at: row.get(8)?,
    })
}

const COLUMNS: &str = "id, application_id, message_id, subject, sender, snippet, detected_status, is_job_related, received_at";

/// Inserts an email record. Returns `false` when a record with the same
/// message id already exists (the insert is silently skipped — re-running
/// a batch must not fail on already-seen messages).
pub fn insert(db: &Database, row: &EmailRecordRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "INSERT OR IGNORE INTO email_records
             (id, application_id, message_id, subject, sender, snippet, detected_status, is_job_related, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.id,
                row.application_id,
                row.message_id,
                row.subject,
                row.sender,
                row.snippet,
                row.detected_status,
                row.is_job_related,
                row.received_at,
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Finds a record by mailbox message id.
pub fn find_by_message_id(
    db: &Database,
    message_id: &str,
) -> Result<Option<EmailRecordRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM email_records WHERE message_id = ?1",
                    COLUMNS
                ),
                params![message_id],
                row_from,
            )
            .optional()?;
        Ok(row)
    })
}

/// Returns the subset of `message_ids` that already have a record.
pub fn find_existing_message_ids(
    db: &Database,
    message_ids: &[String],
) -> Result<Vec<String>, DatabaseError> {
    if message_ids.is_empty() {
        return Ok(Vec::new());
    }

    db.with_conn(|conn| {
        // Build IN clause with positional params.
        let placeholders: Vec<String> =
            (0..message_ids.len()).map(|i| format!("?{}", i + 1)).collect();
        let sql = format!(
            "SELECT message_id FROM email_records WHERE message_id IN ({})",
            placeholders.join(", ")
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> = message_ids
            .iter()
            .map(|id| id as &dyn rusqlite::types::ToSql)
            .collect();
        let mut stmt = conn.prepare(&sql)?;
        let result: Vec<String> = stmt
            .query_map(params_ref.as_slice(), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(result)
    })
}

/// Returns an application's email history, oldest first.
pub fn list_for_application(
    db: &Database,
    application_id: &str,
) -> Result<Vec<EmailRecordRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM email_records WHERE application_id = ?1 ORDER BY received_at ASC",
            COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![application_id], row_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts all email records.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM email_records", [], |r| r.get(0))?;
        Ok(count)
    })
}
