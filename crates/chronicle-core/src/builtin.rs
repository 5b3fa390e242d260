//! Built-in action kinds every world starts with.
//!
//! - `action_wait` does nothing for its duration. Avatars use it to let
//!   time pass; autonomous entities use it to stay busy.
//! - `action_move` re-parents the actor under its target through the
//!   `contains` relationship.

use std::sync::Arc;

use chronicle_types::{Action, RejectionReason, TypeHandle, Validation};

use crate::actions::{ActionKind, ActionKinds};
use crate::clock::describe_span;
use crate::error::CoreError;
use crate::registry::TypeRegistry;
use crate::world::World;

/// Labels of the built-in action kinds.
pub mod labels {
    /// Idle for the action's duration.
    pub const ACTION_WAIT: &str = "action_wait";
    /// Move the actor into the target container.
    pub const ACTION_MOVE: &str = "action_move";
}

/// Handles of the built-in action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinKinds {
    /// `action_wait`
    pub wait: TypeHandle,
    /// `action_move`
    pub move_to: TypeHandle,
}

/// Intern and register every built-in kind.
///
/// # Errors
///
/// Returns [`CoreError::Storage`] if a label cannot be interned.
pub fn register(registry: &TypeRegistry, kinds: &ActionKinds) -> Result<BuiltinKinds, CoreError> {
    let wait = registry.intern(labels::ACTION_WAIT)?;
    kinds.register(wait, Arc::new(WaitAction));
    let move_to = registry.intern(labels::ACTION_MOVE)?;
    kinds.register(move_to, Arc::new(MoveAction));
    Ok(BuiltinKinds { wait, move_to })
}

/// `action_wait`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitAction;

impl ActionKind for WaitAction {
    fn validate(&self, world: &World, action: &Action) -> Result<Validation, CoreError> {
        let duration = world.actions().duration_of(action);
        if duration.as_millis() < 0 {
            return Ok(Validation::reject(
                RejectionReason::InvalidProperty,
                "You cannot wait for a negative amount of time.",
            ));
        }
        Ok(Validation::Accepted)
    }

    fn execute(&self, world: &World, action: &Action) -> Result<String, CoreError> {
        let duration = world.actions().duration_of(action);
        Ok(format!("Waited for {}.", describe_span(duration)))
    }

    fn describe(&self, world: &World, action: &Action) -> Result<String, CoreError> {
        let duration = world.actions().duration_of(action);
        Ok(format!("waiting for {}", describe_span(duration)))
    }
}

/// `action_move`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveAction;

impl ActionKind for MoveAction {
    fn validate(&self, world: &World, action: &Action) -> Result<Validation, CoreError> {
        let actions = world.actions();
        let Some(destination) = actions.target_of(action) else {
            return Ok(Validation::reject(
                RejectionReason::InvalidTarget,
                "Move where?",
            ));
        };
        if !world.entities().exists(destination)? {
            return Ok(Validation::reject(
                RejectionReason::InvalidTarget,
                "There is no such place.",
            ));
        }
        let actor = actions.actor_of(action)?;
        if destination == actor {
            return Ok(Validation::reject(
                RejectionReason::InvalidTarget,
                "You cannot move into yourself.",
            ));
        }
        let here = world
            .relationships()
            .first_provider_of(actor, world.types().contains, world.now())?;
        if here == Some(destination) {
            return Ok(Validation::reject(
                RejectionReason::NoEffect,
                "You are already there.",
            ));
        }
        Ok(Validation::Accepted)
    }

    fn execute(&self, world: &World, action: &Action) -> Result<String, CoreError> {
        let actions = world.actions();
        let actor = actions.actor_of(action)?;
        let destination = actions.target_of(action).ok_or(CoreError::NotFound {
            what: "move destination",
            id: action.id.into_inner(),
        })?;
        world
            .relationships()
            .move_receiver(actor, world.types().contains, destination)?;
        Ok(format!("Entity {actor} moved to {destination}."))
    }

    fn describe(&self, world: &World, action: &Action) -> Result<String, CoreError> {
        match world.actions().target_of(action) {
            Some(destination) => Ok(format!("moving to {destination}")),
            None => Ok("moving".to_owned()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chronicle_types::TimeSpan;

    use super::*;
    use crate::actions::{PerformOutcome, QueueOutcome};

    fn world_with_rooms() -> (World, [chronicle_types::EntityId; 3]) {
        let world = World::in_memory().unwrap();
        let hall = world.create_entity("room").unwrap();
        let library = world.create_entity("room").unwrap();
        let walker = world.create_entity("person").unwrap();
        world
            .relationships()
            .add(hall, walker, world.types().contains)
            .unwrap();
        (world, [hall, library, walker])
    }

    #[test]
    fn move_reparents_actor() {
        let (world, [hall, library, walker]) = world_with_rooms();
        world.entities().mark_avatar(walker).unwrap();
        let outcome = world
            .perform(walker, world.builtins().move_to, Some(library), TimeSpan::ZERO)
            .unwrap();
        assert!(matches!(outcome, PerformOutcome::Performed { .. }));

        let contains = world.types().contains;
        let now = world.now();
        assert_eq!(
            world.relationships().first_provider_of(walker, contains, now).unwrap(),
            Some(library)
        );
        assert!(world.relationships().receivers_of(hall, contains, now).unwrap().is_empty());
    }

    #[test]
    fn move_to_current_room_has_no_effect() {
        let (world, [hall, _, walker]) = world_with_rooms();
        let before = world.events().count().unwrap();
        let outcome = world
            .queue_action(walker, world.builtins().move_to, Some(hall), TimeSpan::ZERO)
            .unwrap();
        assert!(matches!(
            outcome,
            QueueOutcome::Rejected(ref d) if d.reason == RejectionReason::NoEffect
        ));
        assert_eq!(world.events().count().unwrap(), before);
    }

    #[test]
    fn move_without_target_is_rejected() {
        let (world, [_, _, walker]) = world_with_rooms();
        let outcome = world
            .queue_action(walker, world.builtins().move_to, None, TimeSpan::ZERO)
            .unwrap();
        assert!(matches!(
            outcome,
            QueueOutcome::Rejected(ref d) if d.reason == RejectionReason::InvalidTarget
        ));
    }

    #[test]
    fn negative_wait_is_rejected() {
        let (world, [_, _, walker]) = world_with_rooms();
        let outcome = world
            .queue_action(walker, world.builtins().wait, None, TimeSpan(-5))
            .unwrap();
        assert!(matches!(
            outcome,
            QueueOutcome::Rejected(ref d) if d.reason == RejectionReason::InvalidProperty
        ));
    }

    #[test]
    fn pending_wait_is_described() {
        let (world, [_, _, walker]) = world_with_rooms();
        assert_eq!(world.describe_pending(walker).unwrap(), None);
        world
            .queue_action(walker, world.builtins().wait, None, TimeSpan::from_mins(15))
            .unwrap();
        assert_eq!(
            world.describe_pending(walker).unwrap().as_deref(),
            Some("waiting for 15 minutes")
        );
    }
}
