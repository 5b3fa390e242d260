//! Operations on the `type_registry` table.

use rusqlite::{Connection, OptionalExtension};

use crate::error::DbError;

/// Look up the handle stored for `label`.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn handle_of(conn: &Connection, label: &str) -> Result<Option<i64>, DbError> {
    Ok(conn
        .query_row(
            "SELECT handle FROM type_registry WHERE label = ?1",
            [label],
            |row| row.get(0),
        )
        .optional()?)
}

/// Reverse lookup: the label stored for `handle`.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn label_of(conn: &Connection, handle: i64) -> Result<Option<String>, DbError> {
    Ok(conn
        .query_row(
            "SELECT label FROM type_registry WHERE handle = ?1",
            [handle],
            |row| row.get(0),
        )
        .optional()?)
}

/// Persist a new `label -> handle` pair.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the label or handle is already taken.
pub fn insert(conn: &Connection, label: &str, handle: i64) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO type_registry (label, handle) VALUES (?1, ?2)",
        rusqlite::params![label, handle],
    )?;
    Ok(())
}

/// Every registered pair, ordered by handle.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn all(conn: &Connection) -> Result<Vec<(String, i64)>, DbError> {
    let mut stmt = conn.prepare("SELECT label, handle FROM type_registry ORDER BY handle")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
