//! SQLite-backed implementation of the storage contracts.

use chrono::{DateTime, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::db::{application_repo, email_repo, token_repo, Database, DatabaseError};
use crate::model::{Application, NewEmailRecord, Status};

use super::{InsertOutcome, Store, StoreError, StoredToken, TokenStore};

/// Storage over the rusqlite [`Database`] handle. Cloning shares the
/// underlying connection.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Oldest-first email history of an application.
    pub fn email_history(
        &self,
        application_id: &str,
    ) -> Result<Vec<crate::model::EmailRecord>, StoreError> {
        let rows = email_repo::list_for_application(&self.db, application_id)?;
        rows.into_iter().map(map_email_row).collect()
    }

    /// All applications for a user, most recently updated first.
    pub fn applications_for_user(&self, user_id: &str) -> Result<Vec<Application>, StoreError> {
        let rows = application_repo::list_for_user(&self.db, user_id)?;
        rows.into_iter().map(map_application_row).collect()
    }
}

fn parse_status(table: &'static str, value: &str) -> Result<Status, StoreError> {
    Status::parse(value).ok_or_else(|| {
        StoreError::Database(DatabaseError::CorruptRow {
            table,
            reason: format!("unknown status '{}'", value),
        })
    })
}

fn parse_timestamp(table: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::Database(DatabaseError::CorruptRow {
                table,
                reason: format!("bad timestamp '{}': {}", value, e),
            })
        })
}

fn map_application_row(row: application_repo::ApplicationRow) -> Result<Application, StoreError> {
    Ok(Application {
        status: parse_status("applications", &row.status)?,
        created_at: parse_timestamp("applications", &row.created_at)?,
        updated_at: parse_timestamp("applications", &row.updated_at)?,
        id: row.id,
        user_id: row.user_id,
        company: row.company,
        position: row.position,
    })
}

fn map_email_row(row: email_repo::EmailRecordRow) -> Result<crate::model::EmailRecord, StoreError> {
    let detected_status = row
        .detected_status
        .as_deref()
        .map(|s| parse_status("email_records", s))
        .transpose()?;
    Ok(crate::model::EmailRecord {
        detected_status,
        received_at: parse_timestamp("email_records", &row.received_at)?,
        id: row.id,
        application_id: row.application_id,
        message_id: row.message_id,
        subject: row.subject,
        from: row.sender,
        snippet: row.snippet,
        is_job_related: row.is_job_related,
    })
}

impl Store for SqliteStore {
    fn find_application(
        &self,
        user_id: &str,
        company: &str,
        position: &str,
    ) -> Result<Option<Application>, StoreError> {
        let row = application_repo::find_by_identity(&self.db, user_id, company, position)?;
        row.map(map_application_row).transpose()
    }

    fn create_application(
        &self,
        user_id: &str,
        company: &str,
        position: &str,
        status: Status,
    ) -> Result<Application, StoreError> {
        let now = Utc::now();
        let row = application_repo::ApplicationRow {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            company: company.to_string(),
            position: position.to_string(),
            status: status.as_str().to_string(),
            created_at: now.to_rfc3339(),
            updated_at: now.to_rfc3339(),
        };
        application_repo::insert(&self.db, &row)?;
        map_application_row(row)
    }

    fn update_application_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
        application_repo::update_status(&self.db, id, status.as_str(), &Utc::now().to_rfc3339())?;
        Ok(())
    }

    fn create_email_record(&self, record: NewEmailRecord) -> Result<InsertOutcome, StoreError> {
        let row = email_repo::EmailRecordRow {
            id: Uuid::new_v4().to_string(),
            application_id: record.application_id,
            message_id: record.message_id,
            subject: record.subject,
            sender: record.from,
            snippet: record.snippet,
            detected_status: record.detected_status.map(|s| s.as_str().to_string()),
            is_job_related: record.is_job_related,
            received_at: record.received_at.to_rfc3339(),
        };

        if email_repo::insert(&self.db, &row)? {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::Duplicate)
        }
    }

    fn find_existing_message_ids(
        &self,
        message_ids: &[String],
    ) -> Result<Vec<String>, StoreError> {
        Ok(email_repo::find_existing_message_ids(&self.db, message_ids)?)
    }
}

impl TokenStore for SqliteStore {
    fn load_token(&self, user_id: &str) -> Result<Option<StoredToken>, StoreError> {
        let row = token_repo::find(&self.db, user_id)?;
        Ok(row.map(|row| StoredToken {
            user_id: row.user_id,
            access_token: row.access_token,
            refresh_token: SecretString::from(row.refresh_token),
            expires_at: Utc
                .timestamp_opt(row.expires_at, 0)
                .single()
                .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap()),
        }))
    }

    fn save_token(&self, token: &StoredToken) -> Result<(), StoreError> {
        token_repo::upsert(
            &self.db,
            &token_repo::TokenRow {
                user_id: token.user_id.clone(),
                access_token: token.access_token.clone(),
                refresh_token: token.refresh_token.expose_secret().to_string(),
                expires_at: token.expires_at.timestamp(),
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawMessage;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn message(id: &str) -> RawMessage {
        RawMessage {
            id: id.to_string(),
            from: "jobs@acme.io".to_string(),
            subject: "Your application".to_string(),
            body: "body".to_string(),
            snippet: "snippet".to_string(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_find_application_case_insensitive() {
        let s = store();
        let created = s
            .create_application("u1", "Acme", "Backend Engineer", Status::Sent)
            .unwrap();

        let found = s
            .find_application("u1", "ACME", "backend engineer")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.status, Status::Sent);

        assert!(s.find_application("u1", "Globex", "SRE").unwrap().is_none());
    }

    #[test]
    fn test_update_application_status() {
        let s = store();
        let app = s.create_application("u1", "Acme", "Dev", Status::Sent).unwrap();

        s.update_application_status(&app.id, Status::Interview).unwrap();

        let found = s.find_application("u1", "Acme", "Dev").unwrap().unwrap();
        assert_eq!(found.status, Status::Interview);
        assert!(found.updated_at >= app.updated_at);
    }

    #[test]
    fn test_email_record_duplicate_outcome() {
        let s = store();
        let record = NewEmailRecord::suppressed(&message("msg-1"));

        assert_eq!(
            s.create_email_record(record.clone()).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            s.create_email_record(record).unwrap(),
            InsertOutcome::Duplicate
        );
    }

    #[test]
    fn test_find_existing_message_ids() {
        let s = store();
        s.create_email_record(NewEmailRecord::suppressed(&message("msg-1")))
            .unwrap();

        let existing = s
            .find_existing_message_ids(&["msg-1".to_string(), "msg-2".to_string()])
            .unwrap();
        assert_eq!(existing, vec!["msg-1"]);
    }

    #[test]
    fn test_email_history_in_order() {
        let s = store();
        let app = s.create_application("u1", "Acme", "Dev", Status::Sent).unwrap();

        for (id, day) in [("m-late", 10), ("m-early", 2)] {
            let mut record = NewEmailRecord::suppressed(&message(id));
            record.application_id = Some(app.id.clone());
            record.is_job_related = true;
            record.detected_status = Some(Status::Sent);
            record.received_at = Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap();
            s.create_email_record(record).unwrap();
        }

        let history = s.email_history(&app.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message_id, "m-early");
        assert_eq!(history[1].message_id, "m-late");
    }

    #[test]
    fn test_token_round_trip() {
        let s = store();
        let token = StoredToken {
            user_id: "u1".to_string(),
            access_token: "at".to_string(),
            refresh_token: SecretString::from("rt"),
            expires_at: Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap(),
        };
        s.save_token(&token).unwrap();

        let loaded = s.load_token("u1").unwrap().unwrap();
        assert_eq!(loaded.access_token, "at");
        assert_eq!(loaded.refresh_token.expose_secret(), "rt");
        assert_eq!(loaded.expires_at, token.expires_at);
    }
}
