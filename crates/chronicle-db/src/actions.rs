//! Operations on the `action` and `action_property` tables.
//!
//! An action row holds only its type; everything else is an integer
//! property keyed by an interned label. Properties are insert-or-replace,
//! so setting a key twice keeps the last value.
//!
//! Whether an action is pending is a question about its queueing event,
//! answered by [`latest_pending_for`].

use std::collections::BTreeMap;

use chronicle_types::{Action, ActionId, EntityId, EventRecord, TypeHandle, WorldTime};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::DbError;
use crate::events::row_to_event;

/// Insert a new action row with an empty property bag.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the id is already taken.
pub fn insert(conn: &Connection, id: ActionId, kind: TypeHandle) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO action (action_id, action_type) VALUES (?1, ?2)",
        params![id.0, kind.0],
    )?;
    Ok(())
}

/// Load an action and all of its properties.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn get(conn: &Connection, id: ActionId) -> Result<Option<Action>, DbError> {
    let kind: Option<i64> = conn
        .query_row(
            "SELECT action_type FROM action WHERE action_id = ?1",
            [id.0],
            |row| row.get(0),
        )
        .optional()?;
    let Some(kind) = kind else {
        return Ok(None);
    };

    let mut stmt = conn.prepare_cached(
        "SELECT property_key, value FROM action_property WHERE action_id = ?1",
    )?;
    let rows = stmt.query_map([id.0], |row| {
        Ok((TypeHandle(row.get(0)?), row.get::<_, i64>(1)?))
    })?;
    let properties = rows.collect::<Result<BTreeMap<_, _>, _>>()?;

    Ok(Some(Action {
        id,
        kind: TypeHandle(kind),
        properties,
    }))
}

/// Set (or overwrite) one property.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the write fails.
pub fn set_property(
    conn: &Connection,
    id: ActionId,
    key: TypeHandle,
    value: i64,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT OR REPLACE INTO action_property (action_id, property_key, value)
         VALUES (?1, ?2, ?3)",
        params![id.0, key.0, value],
    )?;
    Ok(())
}

/// Read one property.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn property(conn: &Connection, id: ActionId, key: TypeHandle) -> Result<Option<i64>, DbError> {
    Ok(conn
        .query_row(
            "SELECT value FROM action_property WHERE action_id = ?1 AND property_key = ?2",
            params![id.0, key.0],
            |row| row.get(0),
        )
        .optional()?)
}

/// The most recent valid queueing event of an action whose `actor_key`
/// property equals `actor`.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn latest_pending_for(
    conn: &Connection,
    cancel_type: TypeHandle,
    action_event_type: TypeHandle,
    actor_key: TypeHandle,
    actor: EntityId,
    at: WorldTime,
) -> Result<Option<EventRecord>, DbError> {
    let mut stmt = conn.prepare_cached(concat!(
        "SELECT e.event_order, e.event_id, e.type, e.time, e.reference FROM event e ",
        "JOIN action_property p ON p.action_id = e.reference ",
        "AND p.property_key = ?4 AND p.value = ?5 ",
        "WHERE e.type = ?3 AND e.time <= ?2 AND ",
        not_cancelled!("e"),
        " ORDER BY e.event_order DESC LIMIT 1"
    ))?;
    Ok(stmt
        .query_row(
            params![cancel_type.0, at.0, action_event_type.0, actor_key.0, actor.0],
            row_to_event,
        )
        .optional()?)
}
