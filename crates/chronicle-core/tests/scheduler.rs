//! Integration tests for the acting scheduler.
//!
//! Each test builds an in-memory world, registers small recording
//! behaviours, and checks the exact sequence of turns a pass produces.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::sync::Arc;

use chronicle_core::{Acting, ActionKind, CoreError, QueueOutcome, Tickable, World};
use chronicle_types::{Action, EntityId, TimeSpan, Validation, WorldTime};
use parking_lot::Mutex;

/// Shared log of `(time, entity)` turns.
type Turns = Arc<Mutex<Vec<(WorldTime, EntityId)>>>;

/// Records every decision and does nothing else.
struct Recorder {
    interval: TimeSpan,
    turns: Turns,
}

impl Acting for Recorder {
    fn interval(&self, _world: &World, _entity: EntityId) -> TimeSpan {
        self.interval
    }

    fn decide(&self, world: &World, entity: EntityId) -> Result<(), CoreError> {
        self.turns.lock().push((world.now(), entity));
        Ok(())
    }
}

/// An action kind that records when it ran.
struct Stamp {
    runs: Turns,
}

impl ActionKind for Stamp {
    fn validate(&self, _world: &World, _action: &Action) -> Result<Validation, CoreError> {
        Ok(Validation::Accepted)
    }

    fn execute(&self, world: &World, action: &Action) -> Result<String, CoreError> {
        let actor = world.actions().actor_of(action)?;
        self.runs.lock().push((world.now(), actor));
        Ok("stamped".to_owned())
    }

    fn describe(&self, _world: &World, _action: &Action) -> Result<String, CoreError> {
        Ok("stamping".to_owned())
    }
}

fn acting_entity(world: &World, kind: &str) -> EntityId {
    let entity = world.create_entity(kind).unwrap();
    world.entities().mark_acting(entity).unwrap();
    entity
}

fn count_for(turns: &Turns, entity: EntityId) -> usize {
    turns.lock().iter().filter(|(_, e)| *e == entity).count()
}

#[test]
fn intervals_of_ten_and_fifteen_interleave_exactly() {
    let world = World::in_memory().unwrap();
    let turns: Turns = Arc::default();
    world
        .register_acting(
            "fast",
            Arc::new(Recorder {
                interval: TimeSpan(10),
                turns: Arc::clone(&turns),
            }),
        )
        .unwrap();
    world
        .register_acting(
            "slow",
            Arc::new(Recorder {
                interval: TimeSpan(15),
                turns: Arc::clone(&turns),
            }),
        )
        .unwrap();
    let fast = acting_entity(&world, "fast");
    let slow = acting_entity(&world, "slow");

    let summary = world.advance_to(WorldTime(100)).unwrap();

    assert_eq!(count_for(&turns, fast), 10);
    assert_eq!(count_for(&turns, slow), 6);
    assert_eq!(summary.decisions, 16);
    assert_eq!(summary.steps, 16);
    assert_eq!(summary.actions_executed, 0);
    assert_eq!(world.now(), WorldTime(100));

    let recorded = turns.lock().clone();
    assert!(recorded.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    // Ties break on the smaller entity id.
    let at_thirty: Vec<_> = recorded
        .iter()
        .filter(|(t, _)| *t == WorldTime(30))
        .map(|(_, e)| *e)
        .collect();
    assert_eq!(at_thirty, vec![fast, slow]);
}

#[test]
fn second_pass_continues_where_the_first_stopped() {
    let world = World::in_memory().unwrap();
    let turns: Turns = Arc::default();
    world
        .register_acting(
            "ticker",
            Arc::new(Recorder {
                interval: TimeSpan(10),
                turns: Arc::clone(&turns),
            }),
        )
        .unwrap();
    let ticker = acting_entity(&world, "ticker");

    world.advance_to(WorldTime(25)).unwrap();
    world.advance_to(WorldTime(45)).unwrap();

    let times: Vec<_> = turns.lock().iter().map(|(t, _)| t.0).collect();
    assert_eq!(times, vec![10, 20, 30, 40]);
    assert_eq!(
        world
            .tags()
            .value(ticker, world.types().last_action_check, world.now())
            .unwrap(),
        Some(40)
    );
}

#[test]
fn pending_action_executes_once_when_ready() {
    let world = World::in_memory().unwrap();
    let decisions: Turns = Arc::default();
    let runs: Turns = Arc::default();
    world
        .register_acting(
            "clockwork",
            Arc::new(Recorder {
                interval: TimeSpan::from_secs(60),
                turns: Arc::clone(&decisions),
            }),
        )
        .unwrap();
    let stamp = world
        .register_action_kind(
            "action_stamp",
            Arc::new(Stamp {
                runs: Arc::clone(&runs),
            }),
        )
        .unwrap();
    let entity = acting_entity(&world, "clockwork");

    let queued = world
        .queue_action(entity, stamp, None, TimeSpan::from_secs(30))
        .unwrap();
    assert!(matches!(queued, QueueOutcome::Queued(_)));

    let summary = world.advance_to(WorldTime(1_000_000)).unwrap();

    assert_eq!(runs.lock().clone(), vec![(WorldTime(30_000), entity)]);
    let decision_times: Vec<_> = decisions.lock().iter().map(|(t, _)| t.0).collect();
    let expected: Vec<i64> = (0..17).map(|n: i64| 30_000 + n * 60_000).collect();
    assert_eq!(decision_times, expected);
    assert_eq!(summary.actions_executed, 1);
    assert_eq!(world.now(), WorldTime(1_000_000));
    assert!(world.actions().pending_action_of(entity, world.now()).unwrap().is_none());
}

/// Queues a short wait every turn, so the next turn comes from the ready
/// time rather than the interval.
struct Busy {
    work: TimeSpan,
}

impl Acting for Busy {
    fn interval(&self, _world: &World, _entity: EntityId) -> TimeSpan {
        TimeSpan(100)
    }

    fn decide(&self, world: &World, entity: EntityId) -> Result<(), CoreError> {
        world.queue_action(entity, world.builtins().wait, None, self.work)?;
        Ok(())
    }
}

#[test]
fn ready_time_pulls_the_next_turn_forward() {
    let world = World::in_memory().unwrap();
    world
        .register_acting("busy", Arc::new(Busy { work: TimeSpan(30) }))
        .unwrap();
    let _worker = acting_entity(&world, "busy");

    // Turns at 100 (decide), 130 (execute + decide), 160, 190.
    let summary = world.advance_to(WorldTime(200)).unwrap();
    assert_eq!(summary.steps, 4);
    assert_eq!(summary.actions_executed, 3);
    assert_eq!(summary.decisions, 4);
}

/// Tries to advance the clock from inside a decision.
struct Reentrant {
    seen: Arc<Mutex<Option<bool>>>,
}

impl Acting for Reentrant {
    fn decide(&self, world: &World, _entity: EntityId) -> Result<(), CoreError> {
        let refused = matches!(
            world.advance_by(TimeSpan(1)),
            Err(CoreError::SchedulerBusy)
        );
        *self.seen.lock() = Some(refused);
        Ok(())
    }
}

#[test]
fn advancing_from_inside_a_pass_is_refused() {
    let world = World::in_memory().unwrap();
    let seen = Arc::new(Mutex::new(None));
    world
        .register_acting(
            "meddler",
            Arc::new(Reentrant {
                seen: Arc::clone(&seen),
            }),
        )
        .unwrap();
    acting_entity(&world, "meddler");

    world.advance_by(world.default_interval()).unwrap();
    assert_eq!(*seen.lock(), Some(true));

    // The flag is released afterwards.
    assert!(world.advance_by(TimeSpan(1)).is_ok());
}

/// Always tries to move into the room it is already in.
struct Stubborn {
    room: EntityId,
}

impl Acting for Stubborn {
    fn decide(&self, world: &World, entity: EntityId) -> Result<(), CoreError> {
        let outcome =
            world.queue_action(entity, world.builtins().move_to, Some(self.room), TimeSpan::ZERO)?;
        assert!(matches!(outcome, QueueOutcome::Rejected(_)));
        Ok(())
    }
}

#[test]
fn rejected_decisions_are_skipped() {
    let world = World::in_memory().unwrap();
    let room = world.create_entity("room").unwrap();
    world
        .register_acting("stubborn", Arc::new(Stubborn { room }))
        .unwrap();
    let mule = acting_entity(&world, "stubborn");
    world
        .relationships()
        .add(room, mule, world.types().contains)
        .unwrap();

    let summary = world
        .advance_by(TimeSpan(world.default_interval().as_millis().saturating_mul(5)))
        .unwrap();
    assert_eq!(summary.decisions, 5);
    assert_eq!(summary.actions_executed, 0);
}

#[test]
fn untagged_entity_drops_out_of_the_pass() {
    let world = World::in_memory().unwrap();
    let turns: Turns = Arc::default();
    world
        .register_acting(
            "flicker",
            Arc::new(Recorder {
                interval: TimeSpan(10),
                turns: Arc::clone(&turns),
            }),
        )
        .unwrap();
    let flicker = acting_entity(&world, "flicker");

    world.advance_to(WorldTime(20)).unwrap();
    world
        .tags()
        .remove(flicker, world.types().acting, world.now())
        .unwrap();
    world.advance_to(WorldTime(100)).unwrap();

    assert_eq!(count_for(&turns, flicker), 2);
}

/// Shared log of `(time, entity, turn kind)` across ticks and acting turns.
type Timeline = Arc<Mutex<Vec<(WorldTime, EntityId, &'static str)>>>;

/// Ticks at a fixed interval, noting how much time each tick covered.
struct Candle {
    interval: TimeSpan,
    timeline: Timeline,
    elapsed: Arc<Mutex<Vec<TimeSpan>>>,
}

impl Tickable for Candle {
    fn interval(&self, _world: &World, _entity: EntityId) -> TimeSpan {
        self.interval
    }

    fn on_tick(&self, world: &World, entity: EntityId, since_last: TimeSpan) -> Result<(), CoreError> {
        self.timeline.lock().push((world.now(), entity, "tick"));
        self.elapsed.lock().push(since_last);
        Ok(())
    }
}

/// Acts at a fixed interval, writing to the same timeline as [`Candle`].
struct Moth {
    interval: TimeSpan,
    timeline: Timeline,
}

impl Acting for Moth {
    fn interval(&self, _world: &World, _entity: EntityId) -> TimeSpan {
        self.interval
    }

    fn decide(&self, world: &World, entity: EntityId) -> Result<(), CoreError> {
        self.timeline.lock().push((world.now(), entity, "act"));
        Ok(())
    }
}

fn candle(interval: i64, timeline: &Timeline) -> (Arc<Candle>, Arc<Mutex<Vec<TimeSpan>>>) {
    let elapsed = Arc::new(Mutex::new(Vec::new()));
    let candle = Arc::new(Candle {
        interval: TimeSpan(interval),
        timeline: Arc::clone(timeline),
        elapsed: Arc::clone(&elapsed),
    });
    (candle, elapsed)
}

fn tickable_entity(world: &World, kind: &str) -> EntityId {
    let entity = world.create_entity(kind).unwrap();
    world.entities().mark_tickable(entity).unwrap();
    entity
}

#[test]
fn ticks_and_acting_turns_share_one_timeline() {
    let world = World::in_memory().unwrap();
    let timeline: Timeline = Arc::default();
    let (behaviour, elapsed) = candle(10, &timeline);
    world.register_tickable("candle", behaviour).unwrap();
    world
        .register_acting(
            "moth",
            Arc::new(Moth {
                interval: TimeSpan(15),
                timeline: Arc::clone(&timeline),
            }),
        )
        .unwrap();
    let flame = tickable_entity(&world, "candle");
    let moth = acting_entity(&world, "moth");

    let summary = world.advance_to(WorldTime(30)).unwrap();

    assert_eq!(
        timeline.lock().clone(),
        vec![
            (WorldTime(10), flame, "tick"),
            (WorldTime(15), moth, "act"),
            (WorldTime(20), flame, "tick"),
            (WorldTime(30), flame, "tick"),
            (WorldTime(30), moth, "act"),
        ]
    );
    assert_eq!(elapsed.lock().clone(), vec![TimeSpan(10); 3]);
    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.decisions, 2);
    assert_eq!(summary.steps, 5);

    let tags = world.tags();
    let types = world.types();
    assert_eq!(tags.value(flame, types.last_tick, world.now()).unwrap(), Some(30));
    assert_eq!(tags.value(flame, types.last_action_check, world.now()).unwrap(), None);
    assert_eq!(tags.value(moth, types.last_action_check, world.now()).unwrap(), Some(30));
    assert_eq!(tags.value(moth, types.last_tick, world.now()).unwrap(), None);
}

#[test]
fn an_entity_can_tick_and_act() {
    let world = World::in_memory().unwrap();
    let timeline: Timeline = Arc::default();
    let (behaviour, _elapsed) = candle(10, &timeline);
    world.register_tickable("golem", behaviour).unwrap();
    world
        .register_acting(
            "golem",
            Arc::new(Moth {
                interval: TimeSpan(10),
                timeline: Arc::clone(&timeline),
            }),
        )
        .unwrap();
    let golem = acting_entity(&world, "golem");
    world.entities().mark_tickable(golem).unwrap();

    world.advance_to(WorldTime(20)).unwrap();

    // At equal times the tick comes first.
    let kinds: Vec<_> = timeline.lock().iter().map(|(t, _, k)| (t.0, *k)).collect();
    assert_eq!(kinds, vec![(10, "tick"), (10, "act"), (20, "tick"), (20, "act")]);
}

#[test]
fn a_late_tick_covers_all_the_time_it_missed() {
    let world = World::in_memory().unwrap();
    let timeline: Timeline = Arc::default();
    let (behaviour, elapsed) = candle(10, &timeline);
    world.register_tickable("candle", behaviour).unwrap();
    let flame = tickable_entity(&world, "candle");

    world.advance_to(WorldTime(25)).unwrap();
    // Move the clock without a pass; the next tick is clamped to the start
    // of the following pass.
    world.clock().set(WorldTime(100)).unwrap();
    world.advance_to(WorldTime(105)).unwrap();

    let times: Vec<_> = timeline.lock().iter().map(|(t, _, _)| t.0).collect();
    assert_eq!(times, vec![10, 20, 100]);
    assert_eq!(
        elapsed.lock().clone(),
        vec![TimeSpan(10), TimeSpan(10), TimeSpan(80)]
    );

    world
        .tags()
        .remove(flame, world.types().tickable, world.now())
        .unwrap();
    let summary = world.advance_to(WorldTime(200)).unwrap();
    assert_eq!(summary.ticks, 0);
}
