//! Data layer for the Chronicle temporal engine (`SQLite`).
//!
//! One embedded `SQLite` database holds the append-only event log and the
//! tables layered on it. Relationship edges, entity tags and queued actions
//! are rows that point at the event which created them; whether a row is
//! currently "true" is decided by the validity predicate over the event log,
//! never by deleting rows.
//!
//! # Architecture
//!
//! ```text
//! chronicle-core
//!     |
//!     +-- Store::with_conn / with_tx --> one Connection (parking_lot::Mutex)
//!         |-- ids          (global id sequence)
//!         |-- types        (label -> handle registry)
//!         |-- events       (append-only log + validity queries)
//!         |-- edges        (relationship edges)
//!         |-- tags         (entity tags)
//!         |-- actions      (action rows + property bags)
//!         |-- entities     (entity kinds)
//!         +-- clock        (persisted world time)
//! ```
//!
//! Query modules are free functions over `&Connection` so they compose
//! inside a single transaction.

/// SQL fragment: the event aliased `$alias` has not been cancelled as of
/// `?2`, where `?1` is the cancellation event type.
///
/// A cancellation only counts if it was appended after the event it
/// cancels, which is what makes re-asserting a fact after a cancellation
/// possible.
macro_rules! not_cancelled {
    ($alias:literal) => {
        concat!(
            "NOT EXISTS (SELECT 1 FROM event c WHERE c.type = ?1 AND c.reference = ",
            $alias,
            ".event_id AND c.time <= ?2 AND c.event_order > ",
            $alias,
            ".event_order)"
        )
    };
}

pub mod actions;
pub mod clock;
pub mod edges;
pub mod entities;
pub mod error;
pub mod events;
pub mod ids;
pub mod schema;
pub mod store;
pub mod tags;
pub mod types;

// Re-export primary types for convenience.
pub use error::DbError;
pub use rusqlite::{Connection, Transaction};
pub use store::{IN_MEMORY, Store};
