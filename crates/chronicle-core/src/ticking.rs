//! Tickable behaviours: entities that change with the passage of time but
//! never act.
//!
//! A tickable entity is offered a tick at its interval during each
//! scheduler pass, interleaved in time order with acting turns. A tick is
//! told how much world time has passed since the previous one and updates
//! state directly (usually tags). It never queues actions and is never
//! "busy".
//!
//! An entity is scheduled for ticks while it carries `entity_tag_tickable`;
//! the time of its last tick is kept in `entity_tag_last_tick`, separately
//! from the acting bookkeeping, so one entity may be both tickable and
//! acting.

use chronicle_types::{EntityId, TimeSpan};

use crate::acting::KindTable;
use crate::error::CoreError;
use crate::world::World;

/// The time-driven side of an entity.
pub trait Tickable: Send + Sync {
    /// How often `entity` wants to be ticked.
    ///
    /// Defaults to the world's configured scheduler interval.
    fn interval(&self, world: &World, _entity: EntityId) -> TimeSpan {
        world.default_interval()
    }

    /// Advance `entity` to the current world time. `since_last` is the
    /// world time elapsed since its previous tick (or its creation).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] for storage or integrity faults, which abort
    /// the scheduler pass.
    fn on_tick(&self, world: &World, entity: EntityId, since_last: TimeSpan)
    -> Result<(), CoreError>;
}

/// Tickable behaviours keyed by entity kind.
pub type TickingRegistry = KindTable<dyn Tickable>;
