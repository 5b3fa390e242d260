//! Operations on the `event` table.
//!
//! Events are the source of truth. Rows are only ever inserted. The
//! `event_order` column is an `AUTOINCREMENT` key, so `SQLite` never hands
//! out the same order twice, even after the newest row is rolled back or the
//! database is reopened.
//!
//! Every query here takes the cancellation event type as a parameter; this
//! crate does not know any label values.

use chronicle_types::{EventId, EventOrder, EventRecord, TypeHandle, WorldTime};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::DbError;

const COLUMNS: &str = "e.event_order, e.event_id, e.type, e.time, e.reference";

/// Map a row selected with the standard column list.
pub(crate) fn row_to_event(row: &Row<'_>) -> rusqlite::Result<EventRecord> {
    Ok(EventRecord {
        order: EventOrder(row.get(0)?),
        id: EventId(row.get(1)?),
        event_type: TypeHandle(row.get(2)?),
        time: WorldTime(row.get(3)?),
        reference: row.get(4)?,
    })
}

/// Insert one event and return the stored record with its assigned order.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the insert fails (including a duplicate
/// event id).
pub fn insert(
    conn: &Connection,
    id: EventId,
    event_type: TypeHandle,
    time: WorldTime,
    reference: i64,
) -> Result<EventRecord, DbError> {
    conn.execute(
        "INSERT INTO event (event_id, type, time, reference) VALUES (?1, ?2, ?3, ?4)",
        params![id.0, event_type.0, time.0, reference],
    )?;
    let order = EventOrder(conn.last_insert_rowid());
    tracing::debug!(%id, %order, %event_type, time = time.0, reference, "Appended event");
    Ok(EventRecord {
        order,
        id,
        event_type,
        time,
        reference,
    })
}

/// Load one event by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn get(conn: &Connection, id: EventId) -> Result<Option<EventRecord>, DbError> {
    let sql = format!("SELECT {COLUMNS} FROM event e WHERE e.event_id = ?1");
    Ok(conn
        .query_row(&sql, [id.0], row_to_event)
        .optional()?)
}

/// Every event of `(event_type, reference)` valid at `at`, most recent first.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn valid_events(
    conn: &Connection,
    cancel_type: TypeHandle,
    event_type: TypeHandle,
    reference: i64,
    at: WorldTime,
) -> Result<Vec<EventRecord>, DbError> {
    let mut stmt = conn.prepare_cached(concat!(
        "SELECT e.event_order, e.event_id, e.type, e.time, e.reference FROM event e ",
        "WHERE e.type = ?3 AND e.reference = ?4 AND e.time <= ?2 AND ",
        not_cancelled!("e"),
        " ORDER BY e.event_order DESC"
    ))?;
    let rows = stmt.query_map(
        params![cancel_type.0, at.0, event_type.0, reference],
        row_to_event,
    )?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Whether any event of `(event_type, reference)` is valid at `at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn is_valid(
    conn: &Connection,
    cancel_type: TypeHandle,
    event_type: TypeHandle,
    reference: i64,
    at: WorldTime,
) -> Result<bool, DbError> {
    let mut stmt = conn.prepare_cached(concat!(
        "SELECT EXISTS (SELECT 1 FROM event e ",
        "WHERE e.type = ?3 AND e.reference = ?4 AND e.time <= ?2 AND ",
        not_cancelled!("e"),
        ")"
    ))?;
    let exists: bool = stmt.query_row(
        params![cancel_type.0, at.0, event_type.0, reference],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Whether the event `id` itself is valid at `at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn is_event_valid(
    conn: &Connection,
    cancel_type: TypeHandle,
    id: EventId,
    at: WorldTime,
) -> Result<bool, DbError> {
    let mut stmt = conn.prepare_cached(concat!(
        "SELECT EXISTS (SELECT 1 FROM event e ",
        "WHERE e.event_id = ?3 AND e.time <= ?2 AND ",
        not_cancelled!("e"),
        ")"
    ))?;
    let exists: bool = stmt.query_row(params![cancel_type.0, at.0, id.0], |row| row.get(0))?;
    Ok(exists)
}

/// Every valid event of one type at `at`, most recent first.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn valid_of_type(
    conn: &Connection,
    cancel_type: TypeHandle,
    event_type: TypeHandle,
    at: WorldTime,
) -> Result<Vec<EventRecord>, DbError> {
    let mut stmt = conn.prepare_cached(concat!(
        "SELECT e.event_order, e.event_id, e.type, e.time, e.reference FROM event e ",
        "WHERE e.type = ?3 AND e.time <= ?2 AND ",
        not_cancelled!("e"),
        " ORDER BY e.event_order DESC"
    ))?;
    let rows = stmt.query_map(params![cancel_type.0, at.0, event_type.0], row_to_event)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Highest order assigned so far, `None` for an empty log.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn max_order(conn: &Connection) -> Result<Option<EventOrder>, DbError> {
    let order: Option<i64> =
        conn.query_row("SELECT MAX(event_order) FROM event", [], |row| row.get(0))?;
    Ok(order.map(EventOrder))
}

/// Total number of rows in the log, cancellations included.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn count(conn: &Connection) -> Result<u64, DbError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM event", [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}
