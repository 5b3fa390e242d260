//! Type-safe identifier wrappers around `i64`.
//!
//! Every row in the world has a strongly-typed ID to prevent accidental
//! mixing of identifiers at compile time. All IDs except [`EventOrder`] are
//! drawn from the single global id sequence, so an integer is unique across
//! entities, actions, events, edges, tags, and type handles alike. That is
//! what lets an event's `reference` column point at any kind of row.
//!
//! [`EventOrder`] is assigned by the event table itself and is the only
//! ordering the validity rule trusts.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `i64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw integer identifier.
            pub const fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            /// Return the inner integer value.
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of an entity (actor, item, place, clock...).
    EntityId
}

define_id! {
    /// Identifier of an action row.
    ActionId
}

define_id! {
    /// Identifier of an event. Cancellation events reference this value.
    EventId
}

define_id! {
    /// Log-assigned position of an event. Strictly increasing, never reused.
    EventOrder
}

define_id! {
    /// Identifier of a relationship edge row.
    EdgeId
}

define_id! {
    /// Identifier of an entity tag row.
    TagId
}

define_id! {
    /// Interned handle for a string label (event types, verbs, tags,
    /// action kinds, property keys, entity kinds).
    TypeHandle
}
