//! Relationship edges: `(provider, receiver, verb)` facts on the event log.
//!
//! Creating an edge allocates an edge id, appends a `relationship` event
//! referencing it, and stores the edge row, all in one transaction. Removing
//! an edge cancels that event. Nothing is ever deleted, so past structure
//! can be queried at any earlier time.
//!
//! No uniqueness is enforced: an item may be "contained" by two providers at
//! once if a collaborator adds both. Lookups return every valid edge, most
//! recent first, and the `first_*` accessors implement the first-wins
//! convention (e.g. "the current container").

use std::sync::Arc;

use chronicle_db::{Store, edges, ids};
use chronicle_types::{Edge, EdgeId, EntityId, TypeHandle, WorldTime};
use tracing::debug;

use crate::clock::WorldClock;
use crate::error::CoreError;
use crate::event_log::EventLog;
use crate::registry::CoreTypes;

/// Relationship store.
#[derive(Debug)]
pub struct Relationships {
    store: Arc<Store>,
    clock: Arc<WorldClock>,
    log: Arc<EventLog>,
    types: CoreTypes,
}

impl Relationships {
    /// Build the relationship service.
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

    /// Add an edge at the current world time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the transaction fails.
    pub fn add(
        &self,
        provider: EntityId,
        receiver: EntityId,
        verb: TypeHandle,
    ) -> Result<Edge, CoreError> {
        let relationship = self.types.relationship;
        let edge = self.clock.hold(|now| {
            Ok(self.store.with_tx(|tx| {
                let id = EdgeId(ids::next(tx)?);
                let event = EventLog::append_in(tx, relationship, now, id.into_inner())?;
                let edge = Edge {
                    id,
                    event_id: event.id,
                    provider,
                    receiver,
                    verb,
                };
                edges::insert(tx, &edge)?;
                Ok(edge)
            })?)
        })?;
        debug!(%provider, %receiver, %verb, edge = %edge.id, "Added relationship");
        Ok(edge)
    }

    /// Every valid edge into `receiver` with `verb`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn providers_of(
        &self,
        receiver: EntityId,
        verb: TypeHandle,
        at: WorldTime,
    ) -> Result<Vec<Edge>, CoreError> {
        let cancel = self.types.event_cancel;
        Ok(self
            .store
            .with_conn(|conn| edges::by_receiver(conn, cancel, receiver, verb, at))?)
    }

    /// Every valid edge out of `provider` with `verb`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn receivers_of(
        &self,
        provider: EntityId,
        verb: TypeHandle,
        at: WorldTime,
    ) -> Result<Vec<Edge>, CoreError> {
        let cancel = self.types.event_cancel;
        Ok(self
            .store
            .with_conn(|conn| edges::by_provider(conn, cancel, provider, verb, at))?)
    }

    /// The most recent valid provider of `receiver` (first-wins).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn first_provider_of(
        &self,
        receiver: EntityId,
        verb: TypeHandle,
        at: WorldTime,
    ) -> Result<Option<EntityId>, CoreError> {
        Ok(self
            .providers_of(receiver, verb, at)?
            .first()
            .map(|edge| edge.provider))
    }

    /// The most recent valid receiver of `provider` (first-wins).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn first_receiver_of(
        &self,
        provider: EntityId,
        verb: TypeHandle,
        at: WorldTime,
    ) -> Result<Option<EntityId>, CoreError> {
        Ok(self
            .receivers_of(provider, verb, at)?
            .first()
            .map(|edge| edge.receiver))
    }

    /// Remove an edge from `at` onwards by cancelling its creating event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EventInPast`] if `at` is before the world clock,
    /// or [`CoreError::Storage`] if the append fails.
    pub fn remove(&self, edge: &Edge, at: WorldTime) -> Result<(), CoreError> {
        self.log.cancel(edge.event_id, at)?;
        debug!(edge = %edge.id, at = at.0, "Removed relationship");
        Ok(())
    }

    /// Re-parent `receiver`: cancel every current `verb` edge into it and
    /// add one from `new_provider`, atomically, at the current world time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the transaction fails.
    pub fn move_receiver(
        &self,
        receiver: EntityId,
        verb: TypeHandle,
        new_provider: EntityId,
    ) -> Result<Edge, CoreError> {
        let CoreTypes {
            event_cancel,
            relationship,
            ..
        } = self.types;
        let edge = self.clock.hold(|now| {
            Ok(self.store.with_tx(|tx| {
                for old in edges::by_receiver(tx, event_cancel, receiver, verb, now)? {
                    self.log.cancel_in(tx, old.event_id, now)?;
                }
                let id = EdgeId(ids::next(tx)?);
                let event = EventLog::append_in(tx, relationship, now, id.into_inner())?;
                let edge = Edge {
                    id,
                    event_id: event.id,
                    provider: new_provider,
                    receiver,
                    verb,
                };
                edges::insert(tx, &edge)?;
                Ok(edge)
            })?)
        })?;
        debug!(%receiver, %new_provider, %verb, "Moved receiver");
        Ok(edge)
    }
}
