//! Entity tags: `(entity, tag[, value])` facts on the event log.
//!
//! Same layering as relationships. Tags carry an optional integer payload;
//! the scheduler keeps its bookkeeping (creation time, last processed time)
//! in tag values.

use std::collections::BTreeSet;
use std::sync::Arc;

use chronicle_db::{Connection, DbError, Store, ids, tags};
use chronicle_types::{EntityId, TagEdge, TagId, TypeHandle, WorldTime};
use tracing::debug;

use crate::clock::WorldClock;
use crate::error::CoreError;
use crate::event_log::EventLog;
use crate::registry::CoreTypes;

/// Tag store.
#[derive(Debug)]
pub struct Tags {
    store: Arc<Store>,
    clock: Arc<WorldClock>,
    log: Arc<EventLog>,
    types: CoreTypes,
}

impl Tags {
    /// Build the tag service.
    pub const fn new(
        store: Arc<Store>,
        clock: Arc<WorldClock>,
        log: Arc<EventLog>,
        types: CoreTypes,
    ) -> Self {
        Self {
            store,
            clock,
            log,
            types,
        }
    }

    /// Insert a tag on an open connection at `at`.
    pub(crate) fn add_in(
        conn: &Connection,
        tag_event: TypeHandle,
        entity: EntityId,
        tag: TypeHandle,
        value: Option<i64>,
        at: WorldTime,
    ) -> Result<TagEdge, DbError> {
        let id = TagId(ids::next(conn)?);
        let event = EventLog::append_in(conn, tag_event, at, id.into_inner())?;
        let row = TagEdge {
            id,
            event_id: event.id,
            entity,
            tag,
            value,
        };
        tags::insert(conn, &row)?;
        Ok(row)
    }

    /// Cancel every valid `tag` on `entity` on an open connection.
    fn remove_in(
        &self,
        conn: &Connection,
        entity: EntityId,
        tag: TypeHandle,
        at: WorldTime,
    ) -> Result<usize, DbError> {
        let current = tags::for_entity(conn, self.types.event_cancel, entity, tag, at)?;
        for row in &current {
            self.log.cancel_in(conn, row.event_id, at)?;
        }
        Ok(current.len())
    }

    /// Tag `entity` at the current world time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the transaction fails.
    pub fn add(
        &self,
        entity: EntityId,
        tag: TypeHandle,
        value: Option<i64>,
    ) -> Result<TagEdge, CoreError> {
        let tag_event = self.types.entity_tag;
        let row = self.clock.hold(|now| {
            Ok(self
                .store
                .with_tx(|tx| Self::add_in(tx, tag_event, entity, tag, value, now))?)
        })?;
        debug!(%entity, %tag, ?value, "Added tag");
        Ok(row)
    }

    /// Whether `entity` carries `tag` at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn has(&self, entity: EntityId, tag: TypeHandle, at: WorldTime) -> Result<bool, CoreError> {
        Ok(!self.valid(entity, tag, at)?.is_empty())
    }

    /// The value of the most recent valid `tag` on `entity`.
    ///
    /// `None` if the tag is absent or was added without a value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn value(
        &self,
        entity: EntityId,
        tag: TypeHandle,
        at: WorldTime,
    ) -> Result<Option<i64>, CoreError> {
        Ok(self
            .valid(entity, tag, at)?
            .first()
            .and_then(|row| row.value))
    }

    /// Every valid `tag` row on `entity`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn valid(
        &self,
        entity: EntityId,
        tag: TypeHandle,
        at: WorldTime,
    ) -> Result<Vec<TagEdge>, CoreError> {
        let cancel = self.types.event_cancel;
        Ok(self
            .store
            .with_conn(|conn| tags::for_entity(conn, cancel, entity, tag, at))?)
    }

    /// Every valid tag on `entity`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn tags_of(&self, entity: EntityId, at: WorldTime) -> Result<Vec<TagEdge>, CoreError> {
        let cancel = self.types.event_cancel;
        Ok(self
            .store
            .with_conn(|conn| tags::all_for_entity(conn, cancel, entity, at))?)
    }

    /// Entities carrying `tag` at `at`, in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn entities_with(&self, tag: TypeHandle, at: WorldTime) -> Result<Vec<EntityId>, CoreError> {
        let cancel = self.types.event_cancel;
        let rows = self
            .store
            .with_conn(|conn| tags::with_type(conn, cancel, tag, at))?;
        let unique: BTreeSet<EntityId> = rows.into_iter().map(|row| row.entity).collect();
        Ok(unique.into_iter().collect())
    }

    /// Remove every valid `tag` on `entity` from `at` onwards.
    ///
    /// Returns how many tag rows were cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EventInPast`] if `at` is before the world clock,
    /// or [`CoreError::Storage`] if the transaction fails.
    pub fn remove(
        &self,
        entity: EntityId,
        tag: TypeHandle,
        at: WorldTime,
    ) -> Result<usize, CoreError> {
        let removed = self.log.at_or_after(at, || {
            Ok(self
                .store
                .with_tx(|tx| self.remove_in(tx, entity, tag, at))?)
        })?;
        debug!(%entity, %tag, removed, "Removed tag");
        Ok(removed)
    }

    /// Replace the value of `tag` on `entity`: remove then add, atomically,
    /// at the current world time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the transaction fails.
    pub fn set_value(
        &self,
        entity: EntityId,
        tag: TypeHandle,
        value: i64,
    ) -> Result<TagEdge, CoreError> {
        let tag_event = self.types.entity_tag;
        let row = self.clock.hold(|now| {
            Ok(self.store.with_tx(|tx| {
                self.remove_in(tx, entity, tag, now)?;
                Self::add_in(tx, tag_event, entity, tag, Some(value), now)
            })?)
        })?;
        debug!(%entity, %tag, value, "Set tag value");
        Ok(row)
    }
}
