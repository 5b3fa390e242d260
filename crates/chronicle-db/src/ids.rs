//! The persisted global id sequence.
//!
//! One counter row hands out every identifier in the world except event
//! orders. Allocation is a single `UPDATE ... RETURNING`, so it is atomic
//! with whatever transaction it runs in and survives restarts.

use rusqlite::{Connection, OptionalExtension};

use crate::error::DbError;

/// Allocate the next id.
///
/// # Errors
///
/// Returns [`DbError::MissingRow`] if the counter row was never seeded, or
/// [`DbError::Sqlite`] if the update fails.
pub fn next(conn: &Connection) -> Result<i64, DbError> {
    conn.query_row(
        "UPDATE global_id SET value = value + 1 WHERE id = 1 RETURNING value",
        [],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(DbError::MissingRow("global_id"))
}

/// The most recently allocated id (`0` before the first allocation).
///
/// # Errors
///
/// Returns [`DbError::MissingRow`] if the counter row was never seeded.
pub fn current(conn: &Connection) -> Result<i64, DbError> {
    conn.query_row("SELECT value FROM global_id WHERE id = 1", [], |row| {
        row.get(0)
    })
    .optional()?
    .ok_or(DbError::MissingRow("global_id"))
}
