//! Actions: typed, property-bearing units of work.
//!
//! An action row stores only its kind. Actor, target, duration and any
//! kind-specific data are integer properties keyed by interned labels. An
//! action is **pending** while the `action` event that queued it is valid;
//! executing it cancels that event.
//!
//! Behaviour lives in [`ActionKind`] implementations registered against the
//! kind's type handle. The table is built at registration time, so
//! dispatch never inspects anything at runtime beyond a map lookup.
//!
//! The orchestration (policy checks, validation, clock advance for avatars)
//! is on [`World`](crate::world::World); this module holds the storage side
//! and the behaviour table.

use std::collections::BTreeMap;
use std::sync::Arc;

use chronicle_db::{Store, actions, ids};
use chronicle_types::{
    Action, ActionId, EntityId, EventHandle, PendingAction, RejectionDetails, TimeSpan,
    TypeHandle, Validation, WorldTime,
};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::CoreError;
use crate::event_log::EventLog;
use crate::registry::CoreTypes;
use crate::world::World;

/// Behaviour of one action kind.
///
/// Implementations receive the whole [`World`] and may read or write
/// relationships, tags and further actions through it.
pub trait ActionKind: Send + Sync {
    /// Decide whether `action` may be queued as configured.
    ///
    /// A refusal is returned as [`Validation::Rejected`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] only for storage or integrity faults.
    fn validate(&self, world: &World, action: &Action) -> Result<Validation, CoreError>;

    /// Apply the action's effects. Returns a line of narration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the effects cannot be applied.
    fn execute(&self, world: &World, action: &Action) -> Result<String, CoreError>;

    /// Describe the action in progress ("waiting for 15 minutes").
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the description needs data that is missing.
    fn describe(&self, world: &World, action: &Action) -> Result<String, CoreError>;
}

/// Result of queueing an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOutcome {
    /// The action is now pending.
    Queued(PendingAction),
    /// The action was refused; nothing was appended to the event log.
    Rejected(RejectionDetails),
}

impl QueueOutcome {
    /// The pending action, if queued.
    pub const fn queued(&self) -> Option<&PendingAction> {
        match self {
            Self::Queued(pending) => Some(pending),
            Self::Rejected(_) => None,
        }
    }
}

/// Result of performing an avatar action (queue plus immediate execution).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerformOutcome {
    /// The action ran.
    Performed {
        /// The executed action.
        action: Action,
        /// Narration returned by the kind's `execute`.
        narration: String,
    },
    /// The action was refused.
    Rejected(RejectionDetails),
}

/// Table of registered action behaviours, keyed by kind handle.
#[derive(Default)]
pub struct ActionKinds {
    kinds: RwLock<BTreeMap<TypeHandle, Arc<dyn ActionKind>>>,
}

impl ActionKinds {
    /// Register (or replace) the behaviour for `kind`.
    pub fn register(&self, kind: TypeHandle, behaviour: Arc<dyn ActionKind>) {
        if self.kinds.write().insert(kind, behaviour).is_some() {
            debug!(%kind, "Replaced action kind behaviour");
        }
    }

    /// Look up the behaviour for `kind`.
    pub fn get(&self, kind: TypeHandle) -> Option<Arc<dyn ActionKind>> {
        self.kinds.read().get(&kind).cloned()
    }

    /// Look up the behaviour for `kind`, treating absence as a fault.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownType`] if nothing is registered.
    pub fn require(&self, kind: TypeHandle) -> Result<Arc<dyn ActionKind>, CoreError> {
        self.get(kind).ok_or(CoreError::UnknownType {
            handle: kind,
            context: "action kind dispatch",
        })
    }
}

impl core::fmt::Debug for ActionKinds {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActionKinds")
            .field("registered", &self.kinds.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Storage side of actions.
#[derive(Debug)]
pub struct ActionStore {
    store: Arc<Store>,
    log: Arc<EventLog>,
    types: CoreTypes,
}

impl ActionStore {
    /// Build the action store.
    pub const fn new(store: Arc<Store>, log: Arc<EventLog>, types: CoreTypes) -> Self {
        Self { store, log, types }
    }

    /// Create an action row of `kind` with no properties.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the transaction fails.
    pub fn create(&self, kind: TypeHandle) -> Result<ActionId, CoreError> {
        let id = self.store.with_tx(|tx| {
            let id = ActionId(ids::next(tx)?);
            actions::insert(tx, id, kind)?;
            Ok(id)
        })?;
        debug!(action = %id, %kind, "Created action");
        Ok(id)
    }

    /// Create an action with the standard properties, plus any
    /// kind-specific `extra` ones, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the transaction fails.
    pub fn create_with(
        &self,
        kind: TypeHandle,
        actor: EntityId,
        target: Option<EntityId>,
        duration: TimeSpan,
        extra: &[(TypeHandle, i64)],
    ) -> Result<Action, CoreError> {
        let CoreTypes {
            prop_actor,
            prop_target,
            prop_duration,
            ..
        } = self.types;
        let id = self.store.with_tx(|tx| {
            let id = ActionId(ids::next(tx)?);
            actions::insert(tx, id, kind)?;
            actions::set_property(tx, id, prop_actor, actor.into_inner())?;
            if let Some(target) = target {
                actions::set_property(tx, id, prop_target, target.into_inner())?;
            }
            actions::set_property(tx, id, prop_duration, duration.as_millis())?;
            for &(key, value) in extra {
                actions::set_property(tx, id, key, value)?;
            }
            Ok(id)
        })?;
        debug!(action = %id, %kind, %actor, ?target, duration = duration.0, "Created action");
        self.get(id)
    }

    /// Set (or overwrite) one property.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the write fails.
    pub fn set_property(&self, id: ActionId, key: TypeHandle, value: i64) -> Result<(), CoreError> {
        Ok(self
            .store
            .with_conn(|conn| actions::set_property(conn, id, key, value))?)
    }

    /// Read one property.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn property(&self, id: ActionId, key: TypeHandle) -> Result<Option<i64>, CoreError> {
        Ok(self
            .store
            .with_conn(|conn| actions::property(conn, id, key))?)
    }

    /// Load an action with all its properties.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the action does not exist.
    pub fn get(&self, id: ActionId) -> Result<Action, CoreError> {
        self.store
            .with_conn(|conn| actions::get(conn, id))?
            .ok_or(CoreError::NotFound {
                what: "action",
                id: id.into_inner(),
            })
    }

    /// The actor property of `action`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the action has no actor.
    pub fn actor_of(&self, action: &Action) -> Result<EntityId, CoreError> {
        action
            .property(self.types.prop_actor)
            .map(EntityId)
            .ok_or(CoreError::NotFound {
                what: "action actor",
                id: action.id.into_inner(),
            })
    }

    /// The target property of `action`, if any.
    pub fn target_of(&self, action: &Action) -> Option<EntityId> {
        action.property(self.types.prop_target).map(EntityId)
    }

    /// The duration property of `action`; zero if unset.
    pub fn duration_of(&self, action: &Action) -> TimeSpan {
        action
            .property(self.types.prop_duration)
            .map_or(TimeSpan::ZERO, TimeSpan)
    }

    /// Append the `action` event that makes `id` pending, at `at`.
    ///
    /// Backdating is allowed: avatar actions are recorded at their creation
    /// time after the clock has already moved past it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the append fails.
    pub fn record_queued(&self, id: ActionId, at: WorldTime) -> Result<EventHandle, CoreError> {
        self.log
            .append_backdated(self.types.action, at, id.into_inner())
    }

    /// The latest pending action whose actor is `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails, or
    /// [`CoreError::NotFound`] if the event points at a missing action row.
    pub fn pending_action_of(
        &self,
        actor: EntityId,
        at: WorldTime,
    ) -> Result<Option<PendingAction>, CoreError> {
        let CoreTypes {
            event_cancel,
            action,
            prop_actor,
            ..
        } = self.types;
        let event = self.store.with_conn(|conn| {
            actions::latest_pending_for(conn, event_cancel, action, prop_actor, actor, at)
        })?;
        let Some(event) = event else {
            return Ok(None);
        };
        let action = self.get(ActionId(event.reference))?;
        Ok(Some(PendingAction {
            action,
            event: event.handle(),
        }))
    }

    /// Whether `action` is pending at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn is_pending(&self, id: ActionId, at: WorldTime) -> Result<bool, CoreError> {
        self.log.is_valid(self.types.action, id.into_inner(), at)
    }

    /// Creation time plus duration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TimeOverflow`] if the sum is not representable.
    pub fn ready_time(&self, pending: &PendingAction) -> Result<WorldTime, CoreError> {
        pending
            .event
            .time
            .checked_add(self.duration_of(&pending.action))
            .ok_or(CoreError::TimeOverflow {
                context: "computing an action's ready time",
            })
    }

    /// Whether `pending` may execute at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TimeOverflow`] if the ready time overflows.
    pub fn is_ready(&self, pending: &PendingAction, now: WorldTime) -> Result<bool, CoreError> {
        Ok(self.ready_time(pending)? <= now)
    }

    /// Cancel the queueing event of `pending` at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EventInPast`] if `at` is before the world clock,
    /// or [`CoreError::Storage`] if the append fails.
    pub fn complete(&self, pending: &PendingAction, at: WorldTime) -> Result<(), CoreError> {
        self.log.cancel(pending.event.id, at)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chronicle_types::{TimeSpan, WorldTime};

    use super::*;

    #[test]
    fn properties_survive_unrelated_cancellation() {
        let world = World::in_memory().unwrap();
        let actor = world.create_entity("person").unwrap();
        let colour = world.intern("action_prop_colour").unwrap();
        let id = world.actions().create(world.builtins().wait).unwrap();
        world.actions().set_property(id, colour, 42).unwrap();
        assert_eq!(world.actions().property(id, colour).unwrap(), Some(42));

        let lamp = world.create_entity("lamp").unwrap();
        let lit = world.intern("entity_tag_lit").unwrap();
        world.tags().add(lamp, lit, None).unwrap();
        world.tags().remove(lamp, lit, world.now()).unwrap();

        assert_eq!(world.actions().property(id, colour).unwrap(), Some(42));
        assert_eq!(world.actions().get(id).unwrap().property(colour), Some(42));
        assert!(world.actions().pending_action_of(actor, world.now()).unwrap().is_none());
    }

    #[test]
    fn pending_until_completed() {
        let world = World::in_memory().unwrap();
        let actor = world.create_entity("person").unwrap();
        let queued = world
            .queue_action(actor, world.builtins().wait, None, TimeSpan(30))
            .unwrap();
        let pending = queued.queued().cloned().unwrap();

        let actions = world.actions();
        assert!(actions.is_pending(pending.action.id, WorldTime(0)).unwrap());
        assert_eq!(actions.ready_time(&pending).unwrap(), WorldTime(30));
        assert!(!actions.is_ready(&pending, WorldTime(29)).unwrap());
        assert!(actions.is_ready(&pending, WorldTime(30)).unwrap());
        assert_eq!(actions.actor_of(&pending.action).unwrap(), actor);
        assert_eq!(actions.duration_of(&pending.action), TimeSpan(30));
        assert_eq!(actions.target_of(&pending.action), None);

        world.clock().set(WorldTime(30)).unwrap();
        world.execute_pending(&pending).unwrap();
        assert!(!actions.is_pending(pending.action.id, WorldTime(30)).unwrap());
        assert!(actions.is_pending(pending.action.id, WorldTime(29)).unwrap());
        assert!(actions.pending_action_of(actor, WorldTime(30)).unwrap().is_none());
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let world = World::in_memory().unwrap();
        let actor = world.create_entity("person").unwrap();
        let bogus = world.intern("action_bogus").unwrap();
        assert!(matches!(
            world.queue_action(actor, bogus, None, TimeSpan::ZERO),
            Err(CoreError::UnknownType { .. })
        ));
    }

    #[test]
    fn missing_action_is_not_found() {
        let world = World::in_memory().unwrap();
        assert!(matches!(
            world.actions().get(ActionId(123_456)),
            Err(CoreError::NotFound { what: "action", .. })
        ));
    }
}
