//! Application repository — CRUD operations for the `applications` table.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// A raw application row from the database.
#[derive(Debug, Clone)]
pub struct ApplicationRow {
    pub id: String,
    pub user_id: String,
    pub company: String,
    pub position: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

fn row_from(row: &rusqlite::Row<'_>) -> Result<ApplicationRow, rusqlite::Error> {
    Ok(ApplicationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        company: row.get(2)?,
        position: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const COLUMNS: &str = "id, user_id, company, position, status, created_at, updated_at";

/// Inserts a new application.
pub fn insert(db: &Database, row: &ApplicationRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO applications (id, user_id, company, position, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.id,
                row.user_id,
                row.company,
                row.position,
                row.status,
                row.created_at,
                row.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a user's application by company and position, compared
/// case-insensitively. Returns the oldest match if several exist.
pub fn find_by_identity(
    db: &Database,
    user_id: &str,
    company: &str,
    position: &str,
) -> Result<Option<ApplicationRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM applications
                     WHERE user_id = ?1
                       AND company = ?2 COLLATE NOCASE
                       AND position = ?3 COLLATE NOCASE
                     ORDER BY created_at ASC LIMIT 1",
                    COLUMNS
                ),
                params![user_id, company, position],
                row_from,
            )
            .optional()?;
        Ok(row)
    })
}

/// Finds an application by id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ApplicationRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM applications WHERE id = ?1", COLUMNS),
                params![id],
                row_from,
            )
            .optional()?;
        Ok(row)
    })
}

/// Updates an application's status and touch timestamp.
pub fn update_status(
    db: &Database,
    id: &str,
    status: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE applications SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status, updated_at],
        )?;
        Ok(())
    })
}

/// Returns all applications for a user, most recently updated first.
pub fn list_for_user(db: &Database, user_id: &str) -> Result<Vec<ApplicationRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM applications WHERE user_id = ?1 ORDER BY updated_at DESC",
            COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![user_id], row_from)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
