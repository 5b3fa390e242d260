//! The demo scene: a few rooms, a grandfather clock, a hearth, a wanderer,
//! and a player who waits in the hall while the household goes about its
//! hours.

use std::collections::BTreeMap;
use std::sync::Arc;

use chronicle_core::config::DemoConfig;
use chronicle_core::{PerformOutcome, World};
use chronicle_types::{EntityId, TimeSpan, WorldTime};
use tracing::info;

use crate::error::EngineError;
use crate::hearth::{self, Hearth};
use crate::{grandfather, wanderer};

/// Kind label of rooms.
pub const ROOM_KIND: &str = "room";
/// Kind label of the player.
pub const PLAYER_KIND: &str = "person";

/// How often the clock checks whether the hour has turned.
const CLOCK_INTERVAL: TimeSpan = TimeSpan::from_mins(1);
/// How often the wanderer considers moving.
const WANDER_INTERVAL: TimeSpan = TimeSpan::from_mins(10);
/// How often the hearth burns down.
const HEARTH_INTERVAL: TimeSpan = TimeSpan::from_mins(5);
/// Minutes of fuel laid in the hearth at the start.
const HEARTH_FUEL_MINUTES: i64 = 150;

/// Entities of the scene.
#[derive(Debug, Clone)]
pub struct Manor {
    /// Rooms by id, with their names.
    pub rooms: BTreeMap<EntityId, String>,
    /// The grandfather clock.
    pub clock: EntityId,
    /// The hearth.
    pub hearth: EntityId,
    /// Behaviour of the hearth, for reading its fuel.
    pub fire: Arc<Hearth>,
    /// The wandering resident.
    pub wanderer: EntityId,
    /// The player's avatar.
    pub player: EntityId,
}

/// What a run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Number of waits the player performed.
    pub waits: u64,
    /// World time at the end of the run.
    pub final_time: WorldTime,
}

/// Create the rooms and their occupants.
///
/// The clock, the hearth and the player start in the first room; the
/// wanderer starts in the last.
///
/// # Errors
///
/// Returns [`EngineError::Demo`] if fewer than two rooms are configured,
/// or [`EngineError::Core`] if the world rejects a write.
pub fn build(world: &World, demo: &DemoConfig) -> Result<Manor, EngineError> {
    let mut rooms = BTreeMap::new();
    let mut order = Vec::with_capacity(demo.rooms.len());
    for name in &demo.rooms {
        let room = world.create_entity(ROOM_KIND)?;
        rooms.insert(room, name.clone());
        order.push(room);
    }
    let (Some(&first), Some(&last)) = (order.first(), order.last()) else {
        return Err(EngineError::Demo {
            message: "no rooms configured".to_owned(),
        });
    };
    if first == last {
        return Err(EngineError::Demo {
            message: "the wanderer needs at least two rooms".to_owned(),
        });
    }

    let contains = world.types().contains;
    let clock = grandfather::install(world, CLOCK_INTERVAL)?;
    world.relationships().add(first, clock, contains)?;
    let (hearth, fire) = hearth::install(world, HEARTH_INTERVAL, HEARTH_FUEL_MINUTES)?;
    world.relationships().add(first, hearth, contains)?;

    let wanderer = wanderer::install(world, rooms.clone(), last, WANDER_INTERVAL, demo.seed)?;

    let player = world.create_entity(PLAYER_KIND)?;
    world.entities().mark_avatar(player)?;
    world.relationships().add(first, player, contains)?;

    info!(
        rooms = rooms.len(),
        %clock,
        %hearth,
        %wanderer,
        %player,
        "Manor built"
    );
    Ok(Manor {
        rooms,
        clock,
        hearth,
        fire,
        wanderer,
        player,
    })
}

/// Let the player wait in steps of `demo.step_ms` until
/// `demo.total_duration_ms` of world time has passed.
///
/// # Errors
///
/// Returns [`EngineError::Demo`] if a wait is refused, or
/// [`EngineError::Core`] if the world fails.
pub fn run(world: &World, manor: &Manor, demo: &DemoConfig) -> Result<RunReport, EngineError> {
    let start = world.now();
    let end = start
        .checked_add(TimeSpan(demo.total_duration_ms))
        .ok_or_else(|| EngineError::Demo {
            message: "demo end time overflows".to_owned(),
        })?;
    let wait = world.builtins().wait;
    let mut waits: u64 = 0;

    while world.now() < end {
        let left = end.checked_since(world.now()).unwrap_or(TimeSpan::ZERO);
        let step = TimeSpan(demo.step_ms.min(left.as_millis()));

        match world.perform(manor.player, wait, None, step)? {
            PerformOutcome::Performed { narration, .. } => {
                waits = waits.saturating_add(1);
                let at = world
                    .calendar_now()
                    .map_or_else(|| world.now().to_string(), |t| t.format("%H:%M").to_string());
                let wanderer = world
                    .describe_pending(manor.wanderer)?
                    .unwrap_or_else(|| "idle".to_owned());
                let clock = world
                    .describe_pending(manor.clock)?
                    .unwrap_or_else(|| "ticking".to_owned());
                let whereabouts = world
                    .relationships()
                    .first_provider_of(manor.wanderer, world.types().contains, world.now())?
                    .and_then(|room| manor.rooms.get(&room))
                    .map_or("nowhere", String::as_str);
                let fuel = manor.fire.fuel(world, manor.hearth)?;
                info!(%at, %narration, %clock, %wanderer, whereabouts, fuel, "Player waits");
            }
            PerformOutcome::Rejected(details) => {
                return Err(EngineError::Demo {
                    message: format!("the player could not wait: {details}"),
                });
            }
        }
    }

    Ok(RunReport {
        waits,
        final_time: world.now(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_demo_runs_to_completion() {
        let world = World::in_memory().unwrap();
        let demo = DemoConfig::default();
        let manor = build(&world, &demo).unwrap();
        let report = run(&world, &manor, &demo).unwrap();

        assert_eq!(report.final_time, WorldTime(demo.total_duration_ms));
        assert_eq!(report.waits, 12);
        assert_eq!(manor.rooms.len(), demo.rooms.len());
        assert!(world.entities().is_avatar(manor.player).unwrap());
        assert!(world.entities().is_acting(manor.clock).unwrap());
        assert!(world.entities().is_acting(manor.wanderer).unwrap());
        assert!(world.entities().is_tickable(manor.hearth).unwrap());
        // Three hours outlast the fuel.
        assert_eq!(manor.fire.fuel(&world, manor.hearth).unwrap(), 0);
    }

    #[test]
    fn uneven_steps_stop_exactly_at_the_end() {
        let world = World::in_memory().unwrap();
        let demo = DemoConfig {
            step_ms: 700_000,
            total_duration_ms: 1_000_000,
            ..DemoConfig::default()
        };
        let manor = build(&world, &demo).unwrap();
        let report = run(&world, &manor, &demo).unwrap();
        assert_eq!(report.waits, 2);
        assert_eq!(report.final_time, WorldTime(1_000_000));
    }

    #[test]
    fn single_room_is_refused() {
        let world = World::in_memory().unwrap();
        let demo = DemoConfig {
            rooms: vec!["cell".to_owned()],
            ..DemoConfig::default()
        };
        assert!(matches!(
            build(&world, &demo),
            Err(EngineError::Demo { .. })
        ));
    }
}
