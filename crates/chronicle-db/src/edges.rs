//! Operations on the `relationship_edge` table.
//!
//! An edge row is inert on its own: it is visible only while the event that
//! created it (`event_id`) is valid. Lookups join back to `event` and apply
//! the cancellation predicate, returning the most recently created edge
//! first.

use chronicle_types::{Edge, EdgeId, EntityId, EventId, TypeHandle, WorldTime};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::DbError;

fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<Edge> {
    Ok(Edge {
        id: EdgeId(row.get(0)?),
        event_id: EventId(row.get(1)?),
        provider: EntityId(row.get(2)?),
        receiver: EntityId(row.get(3)?),
        verb: TypeHandle(row.get(4)?),
    })
}

/// Insert an edge row. The creating event must be appended separately in
/// the same transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the insert fails.
pub fn insert(conn: &Connection, edge: &Edge) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO relationship_edge (edge_id, event_id, provider_id, receiver_id, verb_type)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            edge.id.0,
            edge.event_id.0,
            edge.provider.0,
            edge.receiver.0,
            edge.verb.0
        ],
    )?;
    Ok(())
}

/// Load one edge row regardless of validity.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn get(conn: &Connection, id: EdgeId) -> Result<Option<Edge>, DbError> {
    Ok(conn
        .query_row(
            "SELECT edge_id, event_id, provider_id, receiver_id, verb_type
             FROM relationship_edge WHERE edge_id = ?1",
            [id.0],
            row_to_edge,
        )
        .optional()?)
}

/// Valid edges with the given receiver and verb, most recent first.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn by_receiver(
    conn: &Connection,
    cancel_type: TypeHandle,
    receiver: EntityId,
    verb: TypeHandle,
    at: WorldTime,
) -> Result<Vec<Edge>, DbError> {
    let mut stmt = conn.prepare_cached(concat!(
        "SELECT r.edge_id, r.event_id, r.provider_id, r.receiver_id, r.verb_type ",
        "FROM relationship_edge r JOIN event e ON e.event_id = r.event_id ",
        "WHERE r.receiver_id = ?3 AND r.verb_type = ?4 AND e.time <= ?2 AND ",
        not_cancelled!("e"),
        " ORDER BY e.event_order DESC"
    ))?;
    let rows = stmt.query_map(
        params![cancel_type.0, at.0, receiver.0, verb.0],
        row_to_edge,
    )?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Valid edges with the given provider and verb, most recent first.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn by_provider(
    conn: &Connection,
    cancel_type: TypeHandle,
    provider: EntityId,
    verb: TypeHandle,
    at: WorldTime,
) -> Result<Vec<Edge>, DbError> {
    let mut stmt = conn.prepare_cached(concat!(
        "SELECT r.edge_id, r.event_id, r.provider_id, r.receiver_id, r.verb_type ",
        "FROM relationship_edge r JOIN event e ON e.event_id = r.event_id ",
        "WHERE r.provider_id = ?3 AND r.verb_type = ?4 AND e.time <= ?2 AND ",
        not_cancelled!("e"),
        " ORDER BY e.event_order DESC"
    ))?;
    let rows = stmt.query_map(
        params![cancel_type.0, at.0, provider.0, verb.0],
        row_to_edge,
    )?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
