//! The hearth: a tickable fire that burns down as world time passes.
//!
//! The fire's remaining fuel is kept in minutes in a tag. Every tick burns
//! the time elapsed since the previous one; once the fuel is gone the fire
//! is out and stays out.

use std::sync::Arc;

use chronicle_core::{CoreError, Tickable, World};
use chronicle_types::{EntityId, TimeSpan, TypeHandle};
use tracing::{debug, info};

/// Kind label of hearths.
pub const KIND: &str = "hearth";

const TAG_FUEL_MINUTES: &str = "entity_tag_fuel_minutes";
const TAG_BURN_REMAINDER: &str = "entity_tag_burn_remainder_ms";

const MINUTE_MS: i64 = 60_000;

/// Tickable behaviour of hearths.
#[derive(Debug)]
pub struct Hearth {
    fuel: TypeHandle,
    remainder: TypeHandle,
    interval: TimeSpan,
}

impl Hearth {
    /// Minutes of fuel left in `hearth`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] if the tag cannot be read.
    pub fn fuel(&self, world: &World, hearth: EntityId) -> Result<i64, CoreError> {
        Ok(world
            .tags()
            .value(hearth, self.fuel, world.now())?
            .unwrap_or(0))
    }
}

impl Tickable for Hearth {
    fn interval(&self, _world: &World, _entity: EntityId) -> TimeSpan {
        self.interval
    }

    fn on_tick(&self, world: &World, hearth: EntityId, since_last: TimeSpan) -> Result<(), CoreError> {
        let fuel = self.fuel(world, hearth)?;
        if fuel <= 0 {
            return Ok(());
        }

        // Sub-minute leftovers carry over so short ticks still burn fuel.
        let now = world.now();
        let carried = world
            .tags()
            .value(hearth, self.remainder, now)?
            .unwrap_or(0);
        let burning = carried.saturating_add(since_last.as_millis().max(0));
        let minutes = burning.checked_div(MINUTE_MS).unwrap_or(0);
        let leftover = burning.checked_rem(MINUTE_MS).unwrap_or(0);

        let remaining = fuel.saturating_sub(minutes).max(0);
        world.tags().set_value(hearth, self.remainder, leftover)?;
        if remaining != fuel {
            world.tags().set_value(hearth, self.fuel, remaining)?;
        }
        if remaining == 0 {
            info!(%hearth, "The fire in the hearth goes out");
        } else {
            debug!(%hearth, remaining, "The fire burns lower");
        }
        Ok(())
    }
}

/// Register the hearth behaviour and light one hearth with `fuel_minutes`
/// of fuel.
///
/// # Errors
///
/// Returns [`CoreError`] if registration or entity creation fails.
pub fn install(
    world: &World,
    interval: TimeSpan,
    fuel_minutes: i64,
) -> Result<(EntityId, Arc<Hearth>), CoreError> {
    let behaviour = Arc::new(Hearth {
        fuel: world.intern(TAG_FUEL_MINUTES)?,
        remainder: world.intern(TAG_BURN_REMAINDER)?,
        interval,
    });
    world.register_tickable(KIND, Arc::clone(&behaviour) as Arc<dyn Tickable>)?;
    let hearth = world.create_entity(KIND)?;
    world.tags().set_value(hearth, behaviour.fuel, fuel_minutes)?;
    world.entities().mark_tickable(hearth)?;
    Ok((hearth, behaviour))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn burns_one_minute_of_fuel_per_minute() {
        let world = World::in_memory().unwrap();
        let (hearth, fire) = install(&world, TimeSpan::from_mins(15), 120).unwrap();

        world.advance_by(TimeSpan::from_mins(45)).unwrap();
        assert_eq!(fire.fuel(&world, hearth).unwrap(), 75);

        world.advance_by(TimeSpan::from_mins(180)).unwrap();
        assert_eq!(fire.fuel(&world, hearth).unwrap(), 0);
    }

    #[test]
    fn short_ticks_still_burn() {
        let world = World::in_memory().unwrap();
        let (hearth, fire) = install(&world, TimeSpan::from_secs(20), 10).unwrap();
        world.advance_by(TimeSpan::from_mins(2)).unwrap();
        assert_eq!(fire.fuel(&world, hearth).unwrap(), 8);
    }
}
