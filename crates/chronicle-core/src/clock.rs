//! World clock: the single current-time cursor of the world.
//!
//! The clock is the source of truth for "now". It is persisted in the store
//! and mirrored in memory so reads do not touch `SQLite`.
//!
//! # Design Principles
//!
//! - The clock never moves backwards. [`WorldClock::set`] refuses an
//!   earlier time with [`CoreError::ClockRegression`].
//! - Only the acting scheduler advances the clock; everything else reads it.
//! - Writers stamp events inside [`WorldClock::hold`], so nothing is
//!   appended behind the clock.
//! - All time arithmetic is checked (no silent overflow).
//! - World time has no relation to wall-clock time. A calendar rendering is
//!   available relative to a configured epoch.

use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use chronicle_db::{Store, clock};
use chronicle_types::{TimeSpan, WorldTime};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::CoreError;

/// Persisted, monotonic world clock.
pub struct WorldClock {
    store: Arc<Store>,
    now: Mutex<WorldTime>,
    epoch: NaiveDateTime,
}

impl WorldClock {
    /// Load the clock from the store, initialising it to `start` if the
    /// store has never recorded a time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the store cannot be read or written.
    pub fn load(
        store: Arc<Store>,
        start: WorldTime,
        epoch: NaiveDateTime,
    ) -> Result<Self, CoreError> {
        let now = match store.with_conn(clock::get)? {
            Some(stored) => {
                info!(now = stored.0, "Resumed world clock");
                stored
            }
            None => {
                store.with_conn(|conn| clock::set(conn, start))?;
                info!(now = start.0, "Initialised world clock");
                start
            }
        };
        Ok(Self {
            store,
            now: Mutex::new(now),
            epoch,
        })
    }

    /// Current world time.
    pub fn now(&self) -> WorldTime {
        *self.now.lock()
    }

    /// Move the clock to `time`.
    ///
    /// Setting the current time again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ClockRegression`] if `time` is earlier than the
    /// current time, or [`CoreError::Storage`] if it cannot be persisted.
    pub fn set(&self, time: WorldTime) -> Result<(), CoreError> {
        let mut now = self.now.lock();
        if time < *now {
            return Err(CoreError::ClockRegression {
                current: *now,
                requested: time,
            });
        }
        if time == *now {
            return Ok(());
        }
        self.store.with_conn(|conn| clock::set(conn, time))?;
        debug!(from = now.0, to = time.0, "Clock moved");
        *now = time;
        Ok(())
    }

    /// Run `f` with the current time, keeping the clock where it is until
    /// `f` returns.
    ///
    /// Writes stamped with the time handed to `f` therefore cannot land
    /// behind a concurrent [`WorldClock::set`]. `f` must not read the clock.
    ///
    /// # Errors
    ///
    /// Propagates whatever `f` returns.
    pub fn hold<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(WorldTime) -> Result<T, CoreError>,
    {
        let now = self.now.lock();
        f(*now)
    }

    /// `now + span`, checked.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TimeOverflow`] if the result is not representable.
    pub fn after(&self, span: TimeSpan) -> Result<WorldTime, CoreError> {
        self.now()
            .checked_add(span)
            .ok_or(CoreError::TimeOverflow {
                context: "offsetting the world clock",
            })
    }

    /// Calendar instant corresponding to a world time.
    pub fn calendar(&self, time: WorldTime) -> Option<NaiveDateTime> {
        let offset = TimeDelta::try_milliseconds(time.as_millis())?;
        self.epoch.checked_add_signed(offset)
    }
}

impl core::fmt::Debug for WorldClock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorldClock")
            .field("now", &self.now())
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

/// Describe a span the way a narrator would ("3 minutes", "an hour").
///
/// Picks the largest unit that divides the span into at least one whole
/// unit and truncates the remainder.
pub fn describe_span(span: TimeSpan) -> String {
    let secs = span.whole_secs();
    let (count, unit) = if secs >= 3_600 {
        (secs.checked_div(3_600).unwrap_or(0), "hour")
    } else if secs >= 60 {
        (secs.checked_div(60).unwrap_or(0), "minute")
    } else {
        (secs, "second")
    };
    match count {
        1 if unit == "hour" => "an hour".to_owned(),
        1 => format!("a {unit}"),
        n => format!("{n} {unit}s"),
    }
}
