//! The wanderer: an acting entity that drifts between rooms.
//!
//! Each turn the wanderer either lingers or sets off for a different room
//! chosen at random. Walking takes a fixed time, after which the built-in
//! move action re-parents it. The random source is seeded from
//! configuration so a run is reproducible.

use std::collections::BTreeMap;
use std::sync::Arc;

use chronicle_core::{Acting, CoreError, QueueOutcome, World};
use chronicle_types::{EntityId, TimeSpan};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Kind label of wanderers.
pub const KIND: &str = "wanderer";

/// How long crossing between two rooms takes.
pub const WALK_DURATION: TimeSpan = TimeSpan::from_mins(2);

/// Chance of staying put on a turn.
const LINGER_PROBABILITY: f64 = 0.5;

/// Acting behaviour of wanderers.
pub struct Wanderer {
    rooms: BTreeMap<EntityId, String>,
    interval: TimeSpan,
    rng: Mutex<StdRng>,
}

impl Wanderer {
    /// Wander among `rooms`, offered a turn every `interval`.
    pub fn new(rooms: BTreeMap<EntityId, String>, interval: TimeSpan, seed: u64) -> Self {
        Self {
            rooms,
            interval,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn room_name(&self, room: EntityId) -> &str {
        self.rooms.get(&room).map_or("somewhere", String::as_str)
    }
}

impl core::fmt::Debug for Wanderer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Wanderer")
            .field("rooms", &self.rooms)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Acting for Wanderer {
    fn interval(&self, _world: &World, _entity: EntityId) -> TimeSpan {
        self.interval
    }

    fn decide(&self, world: &World, wanderer: EntityId) -> Result<(), CoreError> {
        let here = world
            .relationships()
            .first_provider_of(wanderer, world.types().contains, world.now())?;
        let elsewhere: Vec<EntityId> = self
            .rooms
            .keys()
            .copied()
            .filter(|room| Some(*room) != here)
            .collect();

        let destination = {
            let mut rng = self.rng.lock();
            let lingering = rng.random_bool(LINGER_PROBABILITY);
            if lingering || elsewhere.is_empty() {
                None
            } else {
                elsewhere.get(rng.random_range(0..elsewhere.len())).copied()
            }
        };
        let Some(destination) = destination else {
            debug!(%wanderer, "Wanderer lingers");
            return Ok(());
        };

        let outcome = world.queue_action(
            wanderer,
            world.builtins().move_to,
            Some(destination),
            WALK_DURATION,
        )?;
        match outcome {
            QueueOutcome::Queued(_) => {
                info!(
                    %wanderer,
                    from = here.map_or("nowhere", |room| self.room_name(room)),
                    to = self.room_name(destination),
                    "The wanderer sets off"
                );
            }
            QueueOutcome::Rejected(details) => {
                debug!(%wanderer, %details, "Wanderer stays");
            }
        }
        Ok(())
    }
}

/// Register the wanderer behaviour and create one wanderer in `start`.
///
/// # Errors
///
/// Returns [`CoreError`] if registration or entity creation fails.
pub fn install(
    world: &World,
    rooms: BTreeMap<EntityId, String>,
    start: EntityId,
    interval: TimeSpan,
    seed: u64,
) -> Result<EntityId, CoreError> {
    world.register_acting(KIND, Arc::new(Wanderer::new(rooms, interval, seed)))?;
    let wanderer = world.create_entity(KIND)?;
    world
        .relationships()
        .add(start, wanderer, world.types().contains)?;
    world.entities().mark_acting(wanderer)?;
    Ok(wanderer)
}
