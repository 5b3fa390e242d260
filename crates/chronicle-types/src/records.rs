//! Row-shaped records returned by the store.
//!
//! These are plain values. Relationship edges, tag edges and actions are
//! views over the event log: each carries the [`EventId`] of the event that
//! created it, and is removed by cancelling that event.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ActionId, EdgeId, EntityId, EventId, EventOrder, TagId, TypeHandle};
use crate::time::WorldTime;

/// What the caller gets back from an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHandle {
    /// Globally unique id of the new event.
    pub id: EventId,
    /// Log position assigned to the new event.
    pub order: EventOrder,
    /// World time the event took effect.
    pub time: WorldTime,
}

/// A full row of the event table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Log position.
    pub order: EventOrder,
    /// Event id.
    pub id: EventId,
    /// Interned event type.
    pub event_type: TypeHandle,
    /// World time the event took effect.
    pub time: WorldTime,
    /// Id of whatever the event is about. Meaning depends on `event_type`.
    pub reference: i64,
}

impl EventRecord {
    /// The lightweight handle for this record.
    pub const fn handle(&self) -> EventHandle {
        EventHandle {
            id: self.id,
            order: self.order,
            time: self.time,
        }
    }
}

/// A directed verb edge from a provider to a receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Edge id (the creating event's `reference`).
    pub id: EdgeId,
    /// Event that created the edge.
    pub event_id: EventId,
    /// Source entity (e.g. the container).
    pub provider: EntityId,
    /// Target entity (e.g. the contained item).
    pub receiver: EntityId,
    /// Interned verb.
    pub verb: TypeHandle,
}

/// A tag attached to an entity, with an optional integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEdge {
    /// Tag row id (the creating event's `reference`).
    pub id: TagId,
    /// Event that created the tag.
    pub event_id: EventId,
    /// Tagged entity.
    pub entity: EntityId,
    /// Interned tag type.
    pub tag: TypeHandle,
    /// Optional payload.
    pub value: Option<i64>,
}

/// A typed unit of work with a property bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Action id.
    pub id: ActionId,
    /// Interned action type.
    pub kind: TypeHandle,
    /// Property values keyed by interned property name.
    pub properties: BTreeMap<TypeHandle, i64>,
}

impl Action {
    /// Look up one property.
    pub fn property(&self, key: TypeHandle) -> Option<i64> {
        self.properties.get(&key).copied()
    }
}

/// A pending action together with the event that queued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    /// The action row.
    pub action: Action,
    /// The queueing event. Its time is the action's creation time.
    pub event: EventHandle,
}
