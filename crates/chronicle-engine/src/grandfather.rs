//! The grandfather clock: an acting entity that strikes the hour.
//!
//! On the first turn in a new world hour the clock starts a chime sequence
//! with one strike per hour on a 12-hour dial. Each strike is a separate
//! `action_chime` carrying its number and the sequence total; executing a
//! strike records how many remain in a tag, and the clock queues the next
//! one on its following turn. Because the scheduler offers a turn as soon
//! as a pending action is ready, strikes follow each other at the chime
//! duration rather than the polling interval.

use std::sync::Arc;

use chrono::Timelike;
use chronicle_core::{Acting, ActionKind, CoreError, QueueOutcome, World};
use chronicle_types::{Action, EntityId, RejectionReason, TimeSpan, TypeHandle, Validation};
use tracing::{debug, info};

/// Kind label of grandfather clock entities.
pub const KIND: &str = "grandfather_clock";
/// Action kind label of a single strike.
pub const ACTION_CHIME: &str = "action_chime";

const PROP_CHIME_NUMBER: &str = "action_prop_chime_number";
const PROP_TOTAL_CHIMES: &str = "action_prop_total_chimes";
const TAG_CHIMES_REMAINING: &str = "entity_tag_chimes_remaining";
const TAG_CHIME_TOTAL: &str = "entity_tag_chime_total";
const TAG_LAST_STRUCK_HOUR: &str = "entity_tag_last_struck_hour";

const HOUR_MS: i64 = 3_600_000;

/// How long one strike rings.
pub const CHIME_DURATION: TimeSpan = TimeSpan::from_secs(2);

/// Handles the clock needs, interned once.
#[derive(Debug, Clone, Copy)]
struct ChimeTypes {
    chime: TypeHandle,
    number: TypeHandle,
    total: TypeHandle,
    remaining: TypeHandle,
    sequence_total: TypeHandle,
    last_hour: TypeHandle,
}

impl ChimeTypes {
    fn intern(world: &World) -> Result<Self, CoreError> {
        Ok(Self {
            chime: world.intern(ACTION_CHIME)?,
            number: world.intern(PROP_CHIME_NUMBER)?,
            total: world.intern(PROP_TOTAL_CHIMES)?,
            remaining: world.intern(TAG_CHIMES_REMAINING)?,
            sequence_total: world.intern(TAG_CHIME_TOTAL)?,
            last_hour: world.intern(TAG_LAST_STRUCK_HOUR)?,
        })
    }
}

/// `action_chime`: one strike of the bell.
#[derive(Debug)]
pub struct ChimeAction {
    types: ChimeTypes,
}

impl ActionKind for ChimeAction {
    fn validate(&self, _world: &World, action: &Action) -> Result<Validation, CoreError> {
        let number = action.property(self.types.number);
        let total = action.property(self.types.total);
        match (number, total) {
            (Some(n), Some(t)) if (1..=12).contains(&t) && (1..=t).contains(&n) => {
                Ok(Validation::Accepted)
            }
            _ => Ok(Validation::reject(
                RejectionReason::InvalidProperty,
                "A chime needs a number between one and its total of at most twelve.",
            )),
        }
    }

    fn execute(&self, world: &World, action: &Action) -> Result<String, CoreError> {
        let clock = world.actions().actor_of(action)?;
        let number = action.property(self.types.number).unwrap_or(1);
        let total = action.property(self.types.total).unwrap_or(number);
        let remaining = total.saturating_sub(number).max(0);
        world
            .tags()
            .set_value(clock, self.types.remaining, remaining)?;
        info!(%clock, number, total, "The grandfather clock chimes");
        Ok(format!("The grandfather clock chimes ({number} of {total})."))
    }

    fn describe(&self, _world: &World, action: &Action) -> Result<String, CoreError> {
        let number = action.property(self.types.number).unwrap_or(1);
        Ok(format!("striking chime {number}"))
    }
}

/// Acting behaviour of grandfather clocks.
#[derive(Debug)]
pub struct GrandfatherClock {
    types: ChimeTypes,
    interval: TimeSpan,
}

impl GrandfatherClock {
    /// Queue strike `number` of `total`.
    fn strike(
        &self,
        world: &World,
        clock: EntityId,
        number: i64,
        total: i64,
    ) -> Result<(), CoreError> {
        let extra = [(self.types.number, number), (self.types.total, total)];
        let outcome =
            world.queue_action_with(clock, self.types.chime, None, CHIME_DURATION, &extra)?;
        match outcome {
            QueueOutcome::Queued(pending) => {
                debug!(%clock, number, total, action = %pending.action.id, "Chime queued");
            }
            QueueOutcome::Rejected(details) => {
                debug!(%clock, number, total, %details, "Chime not queued");
            }
        }
        Ok(())
    }
}

impl Acting for GrandfatherClock {
    fn interval(&self, _world: &World, _entity: EntityId) -> TimeSpan {
        self.interval
    }

    fn decide(&self, world: &World, clock: EntityId) -> Result<(), CoreError> {
        let now = world.now();
        let tags = world.tags();

        let remaining = tags.value(clock, self.types.remaining, now)?.unwrap_or(0);
        if remaining > 0 {
            let total = tags
                .value(clock, self.types.sequence_total, now)?
                .unwrap_or(remaining);
            let next = total.saturating_sub(remaining).saturating_add(1);
            return self.strike(world, clock, next, total);
        }

        let hour = now.as_millis().checked_div(HOUR_MS).unwrap_or(0);
        let last = match tags.value(clock, self.types.last_hour, now)? {
            Some(last) => last,
            None => {
                let created = world.entities().created_at(clock)?;
                created.as_millis().checked_div(HOUR_MS).unwrap_or(0)
            }
        };
        if hour <= last {
            return Ok(());
        }

        let strikes = world
            .calendar_now()
            .map_or(12, |at| i64::from(at.hour12().1));
        tags.set_value(clock, self.types.last_hour, hour)?;
        tags.set_value(clock, self.types.sequence_total, strikes)?;
        tags.set_value(clock, self.types.remaining, strikes)?;
        info!(%clock, hour, strikes, "The hour has come");
        self.strike(world, clock, 1, strikes)
    }
}

/// Register the chime action and the clock behaviour, and create one clock.
///
/// # Errors
///
/// Returns [`CoreError`] if registration or entity creation fails.
pub fn install(world: &World, interval: TimeSpan) -> Result<EntityId, CoreError> {
    let types = ChimeTypes::intern(world)?;
    world.register_action_kind(ACTION_CHIME, Arc::new(ChimeAction { types }))?;
    world.register_acting(KIND, Arc::new(GrandfatherClock { types, interval }))?;
    let clock = world.create_entity(KIND)?;
    world.entities().mark_acting(clock)?;
    Ok(clock)
}
