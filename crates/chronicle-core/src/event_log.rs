//! The append-only event log and its validity rule.
//!
//! Every fact in the world is an event `(type, time, reference)`. Facts are
//! never updated or deleted; they are retracted by appending a cancellation
//! event whose `reference` is the retracted event's id.
//!
//! An event of `(type, reference)` is **valid at `t`** when it exists with
//! `time <= t` and no cancellation of it exists with `time <= t` and a
//! greater log order. Several events may be valid for the same key at once;
//! queries return them most recent first and single-value callers take the
//! first.
//!
//! Appends must not be earlier than the world clock. The only exception is
//! [`EventLog::append_backdated`], used for initialisation and for recording
//! an avatar action's creation time after the clock already moved past it.

use std::sync::Arc;

use chronicle_db::{Connection, DbError, Store, events, ids};
use chronicle_types::{EventHandle, EventId, EventRecord, TypeHandle, WorldTime};
use tracing::debug;

use crate::clock::WorldClock;
use crate::error::CoreError;

/// Append/cancel/query access to the event table.
#[derive(Debug)]
pub struct EventLog {
    store: Arc<Store>,
    clock: Arc<WorldClock>,
    cancel_type: TypeHandle,
}

impl EventLog {
    /// Build the log service. `cancel_type` is the interned `event_cancel`.
    pub const fn new(store: Arc<Store>, clock: Arc<WorldClock>, cancel_type: TypeHandle) -> Self {
        Self {
            store,
            clock,
            cancel_type,
        }
    }

    /// The cancellation event type.
    pub const fn cancel_type(&self) -> TypeHandle {
        self.cancel_type
    }

    /// Run `f` for a write at `time`, refusing times earlier than the world
    /// clock. The clock is held until `f` returns.
    pub(crate) fn at_or_after<T, F>(&self, time: WorldTime, f: F) -> Result<T, CoreError>
    where
        F: FnOnce() -> Result<T, CoreError>,
    {
        self.clock.hold(|clock| {
            if time < clock {
                return Err(CoreError::EventInPast {
                    clock,
                    requested: time,
                });
            }
            f()
        })
    }

    /// Allocate an id and insert an event on an open connection.
    pub(crate) fn append_in(
        conn: &Connection,
        event_type: TypeHandle,
        time: WorldTime,
        reference: i64,
    ) -> Result<EventRecord, DbError> {
        let id = EventId(ids::next(conn)?);
        events::insert(conn, id, event_type, time, reference)
    }

    /// Append a cancellation of `event_id` on an open connection.
    pub(crate) fn cancel_in(
        &self,
        conn: &Connection,
        event_id: EventId,
        at: WorldTime,
    ) -> Result<EventRecord, DbError> {
        Self::append_in(conn, self.cancel_type, at, event_id.into_inner())
    }

    /// Append a new event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EventInPast`] if `time` is before the world
    /// clock, or [`CoreError::Storage`] if the insert fails.
    pub fn append(
        &self,
        event_type: TypeHandle,
        time: WorldTime,
        reference: i64,
    ) -> Result<EventHandle, CoreError> {
        self.at_or_after(time, || self.append_backdated(event_type, time, reference))
    }

    /// Append a new event at any time, including before the world clock.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the insert fails.
    pub fn append_backdated(
        &self,
        event_type: TypeHandle,
        time: WorldTime,
        reference: i64,
    ) -> Result<EventHandle, CoreError> {
        let record = self
            .store
            .with_tx(|tx| Self::append_in(tx, event_type, time, reference))?;
        Ok(record.handle())
    }

    /// Cancel an event from `at` onwards.
    ///
    /// Cancelling an already-cancelled event appends another cancellation
    /// and changes nothing observable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EventInPast`] if `at` is before the world clock,
    /// or [`CoreError::Storage`] if the insert fails.
    pub fn cancel(&self, event_id: EventId, at: WorldTime) -> Result<EventHandle, CoreError> {
        self.at_or_after(at, || {
            debug!(%event_id, at = at.0, "Cancelling event");
            self.append_backdated(self.cancel_type, at, event_id.into_inner())
        })
    }

    /// Cancel every event of `(event_type, reference)` valid at `at`.
    ///
    /// Returns the number of events cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EventInPast`] if `at` is before the world clock,
    /// or [`CoreError::Storage`] if the store fails.
    pub fn cancel_matching(
        &self,
        event_type: TypeHandle,
        reference: i64,
        at: WorldTime,
    ) -> Result<usize, CoreError> {
        let cancel_type = self.cancel_type;
        let cancelled = self.at_or_after(at, || {
            Ok(self.store.with_tx(|tx| {
                let valid = events::valid_events(tx, cancel_type, event_type, reference, at)?;
                for event in &valid {
                    Self::append_in(tx, cancel_type, at, event.id.into_inner())?;
                }
                Ok(valid.len())
            })?)
        })?;
        debug!(%event_type, reference, cancelled, "Cancelled matching events");
        Ok(cancelled)
    }

    /// Whether any event of `(event_type, reference)` is valid at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn is_valid(
        &self,
        event_type: TypeHandle,
        reference: i64,
        at: WorldTime,
    ) -> Result<bool, CoreError> {
        Ok(self.store.with_conn(|conn| {
            events::is_valid(conn, self.cancel_type, event_type, reference, at)
        })?)
    }

    /// Whether the specific event `event_id` is valid at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn is_event_valid(&self, event_id: EventId, at: WorldTime) -> Result<bool, CoreError> {
        Ok(self
            .store
            .with_conn(|conn| events::is_event_valid(conn, self.cancel_type, event_id, at))?)
    }

    /// The most recent valid event of `(event_type, reference)` at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn latest_valid(
        &self,
        event_type: TypeHandle,
        reference: i64,
        at: WorldTime,
    ) -> Result<Option<EventRecord>, CoreError> {
        Ok(self
            .valid_events(event_type, reference, at)?
            .into_iter()
            .next())
    }

    /// Every valid event of `(event_type, reference)` at `at`, most recent
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn valid_events(
        &self,
        event_type: TypeHandle,
        reference: i64,
        at: WorldTime,
    ) -> Result<Vec<EventRecord>, CoreError> {
        Ok(self.store.with_conn(|conn| {
            events::valid_events(conn, self.cancel_type, event_type, reference, at)
        })?)
    }

    /// Load a single event by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such event exists.
    pub fn get(&self, event_id: EventId) -> Result<EventRecord, CoreError> {
        self.store
            .with_conn(|conn| events::get(conn, event_id))?
            .ok_or(CoreError::NotFound {
                what: "event",
                id: event_id.into_inner(),
            })
    }

    /// Total number of events in the log, cancellations included.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn count(&self) -> Result<u64, CoreError> {
        Ok(self.store.with_conn(events::count)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;

    const CANCEL: TypeHandle = TypeHandle(1_000);
    const FACT: TypeHandle = TypeHandle(1_001);

    fn log_at(start: i64) -> (EventLog, Arc<WorldClock>) {
        let store = Arc::new(Store::in_memory().unwrap());
        let epoch = DateTime::<Utc>::UNIX_EPOCH.naive_utc();
        let clock =
            Arc::new(WorldClock::load(Arc::clone(&store), WorldTime(start), epoch).unwrap());
        (EventLog::new(store, Arc::clone(&clock), CANCEL), clock)
    }

    #[test]
    fn validity_is_monotone_until_cancelled() {
        let (log, clock) = log_at(0);
        let fact = log.append(FACT, WorldTime(10), 7).unwrap();
        for t in [10, 20, 1_000] {
            assert!(log.is_valid(FACT, 7, WorldTime(t)).unwrap());
        }
        assert!(!log.is_valid(FACT, 7, WorldTime(9)).unwrap());

        clock.set(WorldTime(50)).unwrap();
        log.cancel(fact.id, WorldTime(50)).unwrap();
        assert!(log.is_valid(FACT, 7, WorldTime(49)).unwrap());
        assert!(!log.is_valid(FACT, 7, WorldTime(50)).unwrap());
        assert!(!log.is_event_valid(fact.id, WorldTime(10_000)).unwrap());
    }

    #[test]
    fn cancelling_twice_is_idempotent() {
        let (log, _clock) = log_at(0);
        let fact = log.append(FACT, WorldTime(0), 7).unwrap();
        log.cancel(fact.id, WorldTime(5)).unwrap();
        log.cancel(fact.id, WorldTime(5)).unwrap();
        assert!(!log.is_valid(FACT, 7, WorldTime(5)).unwrap());
        assert!(log.is_valid(FACT, 7, WorldTime(4)).unwrap());
    }

    #[test]
    fn append_before_clock_needs_backdating() {
        let (log, _clock) = log_at(100);
        assert!(matches!(
            log.append(FACT, WorldTime(99), 1),
            Err(CoreError::EventInPast { .. })
        ));
        let handle = log.append_backdated(FACT, WorldTime(99), 1).unwrap();
        assert_eq!(handle.time, WorldTime(99));
        assert!(matches!(
            log.cancel(handle.id, WorldTime(50)),
            Err(CoreError::EventInPast { .. })
        ));
    }

    #[test]
    fn latest_valid_is_first_of_valid_events() {
        let (log, _clock) = log_at(0);
        let older = log.append(FACT, WorldTime(0), 7).unwrap();
        let newer = log.append(FACT, WorldTime(0), 7).unwrap();
        assert!(newer.order > older.order);
        let latest = log.latest_valid(FACT, 7, WorldTime(0)).unwrap().unwrap();
        assert_eq!(latest.id, newer.id);
        assert_eq!(log.valid_events(FACT, 7, WorldTime(0)).unwrap().len(), 2);
    }

    #[test]
    fn cancel_matching_retracts_every_valid_event() {
        let (log, _clock) = log_at(0);
        log.append(FACT, WorldTime(0), 7).unwrap();
        log.append(FACT, WorldTime(0), 7).unwrap();
        log.append(FACT, WorldTime(0), 8).unwrap();
        assert_eq!(log.cancel_matching(FACT, 7, WorldTime(1)).unwrap(), 2);
        assert!(!log.is_valid(FACT, 7, WorldTime(1)).unwrap());
        assert!(log.is_valid(FACT, 8, WorldTime(1)).unwrap());
        assert_eq!(log.cancel_matching(FACT, 7, WorldTime(1)).unwrap(), 0);
    }

    #[test]
    fn reasserting_after_cancellation_is_valid_again() {
        let (log, _clock) = log_at(0);
        let first = log.append(FACT, WorldTime(0), 7).unwrap();
        log.cancel(first.id, WorldTime(5)).unwrap();
        log.append(FACT, WorldTime(5), 7).unwrap();
        assert!(log.is_valid(FACT, 7, WorldTime(5)).unwrap());
        assert_eq!(log.valid_events(FACT, 7, WorldTime(5)).unwrap().len(), 1);
    }

    #[test]
    fn get_reports_missing_events() {
        let (log, _clock) = log_at(0);
        let handle = log.append(FACT, WorldTime(3), 9).unwrap();
        assert_eq!(log.get(handle.id).unwrap().reference, 9);
        assert!(matches!(
            log.get(EventId(123_456)),
            Err(CoreError::NotFound { what: "event", .. })
        ));
        assert_eq!(log.count().unwrap(), 1);
    }
}
