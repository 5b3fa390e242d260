//! Operations on the `entity_tag` table.
//!
//! Same layering as relationship edges: a tag row is visible only while the
//! event that created it is valid.

use chronicle_types::{EntityId, EventId, TagEdge, TagId, TypeHandle, WorldTime};
use rusqlite::{Connection, Row, params};

use crate::error::DbError;

fn row_to_tag(row: &Row<'_>) -> rusqlite::Result<TagEdge> {
    Ok(TagEdge {
        id: TagId(row.get(0)?),
        event_id: EventId(row.get(1)?),
        entity: EntityId(row.get(2)?),
        tag: TypeHandle(row.get(3)?),
        value: row.get(4)?,
    })
}

/// Insert a tag row. The creating event must be appended separately in the
/// same transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the insert fails.
pub fn insert(conn: &Connection, tag: &TagEdge) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO entity_tag (tag_id, event_id, entity_id, tag_type, value)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![tag.id.0, tag.event_id.0, tag.entity.0, tag.tag.0, tag.value],
    )?;
    Ok(())
}

/// Valid tags of one type on one entity, most recent first.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn for_entity(
    conn: &Connection,
    cancel_type: TypeHandle,
    entity: EntityId,
    tag: TypeHandle,
    at: WorldTime,
) -> Result<Vec<TagEdge>, DbError> {
    let mut stmt = conn.prepare_cached(concat!(
        "SELECT t.tag_id, t.event_id, t.entity_id, t.tag_type, t.value ",
        "FROM entity_tag t JOIN event e ON e.event_id = t.event_id ",
        "WHERE t.entity_id = ?3 AND t.tag_type = ?4 AND e.time <= ?2 AND ",
        not_cancelled!("e"),
        " ORDER BY e.event_order DESC"
    ))?;
    let rows = stmt.query_map(params![cancel_type.0, at.0, entity.0, tag.0], row_to_tag)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Every valid tag on one entity, most recent first.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn all_for_entity(
    conn: &Connection,
    cancel_type: TypeHandle,
    entity: EntityId,
    at: WorldTime,
) -> Result<Vec<TagEdge>, DbError> {
    let mut stmt = conn.prepare_cached(concat!(
        "SELECT t.tag_id, t.event_id, t.entity_id, t.tag_type, t.value ",
        "FROM entity_tag t JOIN event e ON e.event_id = t.event_id ",
        "WHERE t.entity_id = ?3 AND e.time <= ?2 AND ",
        not_cancelled!("e"),
        " ORDER BY e.event_order DESC"
    ))?;
    let rows = stmt.query_map(params![cancel_type.0, at.0, entity.0], row_to_tag)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Every valid tag of one type across all entities, most recent first.
///
/// # Errors
///
/// Returns [`DbError::Sqlite`] if the query fails.
pub fn with_type(
    conn: &Connection,
    cancel_type: TypeHandle,
    tag: TypeHandle,
    at: WorldTime,
) -> Result<Vec<TagEdge>, DbError> {
    let mut stmt = conn.prepare_cached(concat!(
        "SELECT t.tag_id, t.event_id, t.entity_id, t.tag_type, t.value ",
        "FROM entity_tag t JOIN event e ON e.event_id = t.event_id ",
        "WHERE t.tag_type = ?3 AND e.time <= ?2 AND ",
        not_cancelled!("e"),
        " ORDER BY e.event_order DESC"
    ))?;
    let rows = stmt.query_map(params![cancel_type.0, at.0, tag.0], row_to_tag)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use crate::events;
    use crate::store::Store;

    const CANCEL: TypeHandle = TypeHandle(1);
    const TAG_EVENT: TypeHandle = TypeHandle(2);
    const ACTING: TypeHandle = TypeHandle(3);
    const LAST_CHECK: TypeHandle = TypeHandle(4);

    fn add(conn: &Connection, tag_id: i64, entity: i64, tag: TypeHandle, value: Option<i64>) -> TagEdge {
        let event_id = tag_id + 1000;
        events::insert(conn, EventId(event_id), TAG_EVENT, WorldTime(0), tag_id).unwrap();
        let row = TagEdge {
            id: TagId(tag_id),
            event_id: EventId(event_id),
            entity: EntityId(entity),
            tag,
            value,
        };
        insert(conn, &row).unwrap();
        row
    }

    #[test]
    fn tag_queries() {
        let store = Store::in_memory().unwrap();
        store
            .with_conn(|c| {
                let acting = add(c, 10, 1, ACTING, None);
                let check = add(c, 11, 1, LAST_CHECK, Some(60_000));
                add(c, 12, 2, ACTING, None);

                assert_eq!(for_entity(c, CANCEL, EntityId(1), ACTING, WorldTime(0))?, vec![acting]);
                assert_eq!(
                    for_entity(c, CANCEL, EntityId(1), LAST_CHECK, WorldTime(0))?[0].value,
                    Some(60_000)
                );
                assert_eq!(all_for_entity(c, CANCEL, EntityId(1), WorldTime(0))?, vec![check, acting]);
                assert_eq!(with_type(c, CANCEL, ACTING, WorldTime(0))?.len(), 2);

                events::insert(c, EventId(50), CANCEL, WorldTime(0), acting.event_id.0)?;
                assert!(for_entity(c, CANCEL, EntityId(1), ACTING, WorldTime(0))?.is_empty());
                assert_eq!(with_type(c, CANCEL, ACTING, WorldTime(0))?.len(), 1);
                Ok(())
            })
            .unwrap();
    }
}
