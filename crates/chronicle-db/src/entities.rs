//! Operations on the `entity` table.
//!
//! Entity rows only record which kind each id was created as. Everything
//! else about an entity lives in tags and relationships.

use chronicle_types::{EntityId, TypeHandle};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::DbError;

/// Record a new entity.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the id is already taken.
pub fn insert(conn: &Connection, id: EntityId, kind: TypeHandle) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO entity (entity_id, kind) VALUES (?1, ?2)",
        params![id.0, kind.0],
    )?;
    Ok(())
}

/// The kind an entity was created as.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn kind_of(conn: &Connection, id: EntityId) -> Result<Option<TypeHandle>, DbError> {
    let kind: Option<i64> = conn
        .query_row(
            "SELECT kind FROM entity WHERE entity_id = ?1",
            [id.0],
            |row| row.get(0),
        )
        .optional()?;
    Ok(kind.map(TypeHandle))
}

/// All entities of one kind, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn of_kind(conn: &Connection, kind: TypeHandle) -> Result<Vec<EntityId>, DbError> {
    let mut stmt =
        conn.prepare_cached("SELECT entity_id FROM entity WHERE kind = ?1 ORDER BY entity_id")?;
    let rows = stmt.query_map([kind.0], |row| row.get(0).map(EntityId))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
