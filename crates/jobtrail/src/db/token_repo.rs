//! OAuth token repository — one row per user.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// A stored OAuth token pair with its expiry (unix seconds).
#[derive(Debug, Clone)]
pub struct TokenRow {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Inserts or replaces the token row for a user.
pub fn upsert(db: &Database, row: &TokenRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR REPLACE INTO oauth_tokens (user_id, access_token, refresh_token, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![row.user_id, row.access_token, row.refresh_token, row.expires_at],
        )?;
        Ok(())
    })
}

/// Finds the token row for a user.
pub fn find(db: &Database, user_id: &str) -> Result<Option<TokenRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT user_id, access_token, refresh_token, expires_at
                 FROM oauth_tokens WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(TokenRow {
                        user_id: row.get(0)?,
                        access_token: row.get(1)?,
                        refresh_token: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_upsert_and_find() {
        let db = test_db();
        upsert(
            &db,
            &TokenRow {
                user_id: "u1".to_string(),
                access_token: "at-1".to_string(),
                refresh_token: "rt-1".to_string(),
                expires_at: 1_700_000_000,
            },
        )
        .unwrap();

        let found = find(&db, "u1").unwrap().unwrap();
        assert_eq!(found.access_token, "at-1");
        assert!(find(&db, "u2").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let db = test_db();
        for token in ["at-1", "at-2"] {
            upsert(
                &db,
                &TokenRow {
                    user_id: "u1".to_string(),
                    access_token: token.to_string(),
                    refresh_token: "rt".to_string(),
                    expires_at: 0,
                },
            )
            .unwrap();
        }

        let found = find(&db, "u1").unwrap().unwrap();
        assert_eq!(found.access_token, "at-2");
    }
}
