//! Error type shared by every core subsystem.
//!
//! Validation failures are deliberately absent: a rejected action is an
//! ordinary [`Validation::Rejected`] outcome, not an error. Everything here
//! is either a storage fault or an integrity fault the caller cannot
//! recover from by retrying the same request.
//!
//! [`Validation::Rejected`]: chronicle_types::Validation::Rejected

use chronicle_db::DbError;
use chronicle_types::{TypeHandle, WorldTime};

/// Errors raised by the core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The backing store failed.
    #[error("storage failure: {source}")]
    Storage {
        /// The underlying store error.
        #[from]
        source: DbError,
    },

    /// A referenced row does not exist.
    #[error("{what} {id} not found")]
    NotFound {
        /// Kind of row that was looked up.
        what: &'static str,
        /// The raw id that was looked up.
        id: i64,
    },

    /// A type handle has no label, or no behaviour is registered for it.
    #[error("unknown type handle {handle}: {context}")]
    UnknownType {
        /// The offending handle.
        handle: TypeHandle,
        /// What the handle was being resolved for.
        context: &'static str,
    },

    /// An attempt to move the world clock backwards.
    #[error("clock regression: current time {current}, requested {requested}")]
    ClockRegression {
        /// Clock value before the request.
        current: WorldTime,
        /// The earlier time that was requested.
        requested: WorldTime,
    },

    /// An append earlier than the world clock through the non-backdating
    /// entry point.
    #[error("event at {requested} is before the world clock ({clock})")]
    EventInPast {
        /// Current world clock.
        clock: WorldTime,
        /// Requested event time.
        requested: WorldTime,
    },

    /// An advance was requested while a scheduler pass is running.
    #[error("scheduler is already advancing the clock")]
    SchedulerBusy,

    /// Time arithmetic left the representable range.
    #[error("time overflow while {context}")]
    TimeOverflow {
        /// What was being computed.
        context: &'static str,
    },

    /// A configuration value is unusable at runtime.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: crate::config::ConfigError,
    },
}
