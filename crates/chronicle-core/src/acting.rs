//! Acting behaviours: how autonomous entities decide what to do.
//!
//! During a scheduler pass each acting entity is offered a turn whenever it
//! is due. The [`Acting`] trait abstracts the mechanism by which the entity
//! chooses its next action -- a scripted routine, a random wanderer, an
//! external planner, or a test stub. A behaviour usually responds by calling
//! [`World::queue_action`]; doing nothing is a valid decision.
//!
//! Behaviours are registered per entity kind and resolved by looking up the
//! entity's recorded kind. Nothing is discovered by runtime introspection.

use std::collections::BTreeMap;
use std::sync::Arc;

use chronicle_types::{EntityId, TimeSpan, TypeHandle};
use parking_lot::RwLock;

use crate::error::CoreError;
use crate::world::World;

/// The decision-making side of an acting entity.
pub trait Acting: Send + Sync {
    /// How often `entity` wants to be offered a turn.
    ///
    /// Defaults to the world's configured scheduler interval.
    fn interval(&self, world: &World, _entity: EntityId) -> TimeSpan {
        world.default_interval()
    }

    /// Take a turn at the current world time.
    ///
    /// A rejected [`World::queue_action`] inside this call just means the
    /// entity does nothing this turn; it is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] for storage or integrity faults, which abort
    /// the scheduler pass.
    fn decide(&self, world: &World, entity: EntityId) -> Result<(), CoreError>;
}

/// Behaviours keyed by entity kind.
pub struct KindTable<B: ?Sized> {
    by_kind: RwLock<BTreeMap<TypeHandle, Arc<B>>>,
}

/// Acting behaviours keyed by entity kind.
pub type ActingRegistry = KindTable<dyn Acting>;

impl<B: ?Sized> KindTable<B> {
    /// Register (or replace) the behaviour for entities of `kind`.
    pub fn register(&self, kind: TypeHandle, behaviour: Arc<B>) {
        self.by_kind.write().insert(kind, behaviour);
    }

    /// The behaviour for entities of `kind`.
    pub fn for_kind(&self, kind: TypeHandle) -> Option<Arc<B>> {
        self.by_kind.read().get(&kind).cloned()
    }
}

impl<B: ?Sized> Default for KindTable<B> {
    fn default() -> Self {
        Self {
            by_kind: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<B: ?Sized> core::fmt::Debug for KindTable<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KindTable")
            .field("kinds", &self.by_kind.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A behaviour that never acts. Keeps an entity on the schedule without
/// doing anything with its turns.
#[derive(Debug, Clone, Copy, Default)]
pub struct Idle {
    interval: Option<TimeSpan>,
}

impl Idle {
    /// Idle at the world's default interval.
    pub const fn new() -> Self {
        Self { interval: None }
    }

    /// Idle at a fixed interval.
    pub const fn every(interval: TimeSpan) -> Self {
        Self {
            interval: Some(interval),
        }
    }
}

impl Acting for Idle {
    fn interval(&self, world: &World, _entity: EntityId) -> TimeSpan {
        self.interval.unwrap_or_else(|| world.default_interval())
    }

    fn decide(&self, _world: &World, _entity: EntityId) -> Result<(), CoreError> {
        Ok(())
    }
}
