//! Shared type definitions for the Chronicle temporal engine.
//!
//! This crate is the single source of truth for the plain values that cross
//! crate boundaries: integer identifiers, world time, store records, and
//! validation outcomes. It has no behaviour beyond small constructors.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe integer wrappers for every identifier
//! - [`time`] -- World time and spans in milliseconds
//! - [`records`] -- Event, edge, tag and action records
//! - [`validation`] -- Action validation outcome and rejection details

pub mod ids;
pub mod records;
pub mod time;
pub mod validation;

// Re-export all public types at crate root for convenience.
pub use ids::{ActionId, EdgeId, EntityId, EventId, EventOrder, TagId, TypeHandle};
pub use records::{Action, Edge, EventHandle, EventRecord, PendingAction, TagEdge};
pub use time::{TimeSpan, WorldTime};
pub use validation::{RejectionDetails, RejectionReason, Validation};
