//! End-to-end tests for the world context: avatar actions, the
//! single-pending policy, persistence across reopen, and cross-thread use.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]

use std::sync::Arc;

use chrono::NaiveDate;
use chronicle_core::config::ChronicleConfig;
use chronicle_core::{Acting, CoreError, PerformOutcome, QueueOutcome, World};
use chronicle_types::{EntityId, RejectionReason, TimeSpan, WorldTime};
use parking_lot::Mutex;

/// Records decision times and does nothing else.
struct Recorder {
    interval: TimeSpan,
    turns: Arc<Mutex<Vec<WorldTime>>>,
}

impl Recorder {
    fn every(interval: TimeSpan) -> (Arc<Self>, Arc<Mutex<Vec<WorldTime>>>) {
        let turns = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::new(Self {
            interval,
            turns: Arc::clone(&turns),
        });
        (recorder, turns)
    }
}

impl Acting for Recorder {
    fn interval(&self, _world: &World, _entity: EntityId) -> TimeSpan {
        self.interval
    }

    fn decide(&self, world: &World, _entity: EntityId) -> Result<(), CoreError> {
        self.turns.lock().push(world.now());
        Ok(())
    }
}

#[test]
fn avatar_actions_complete_instantly_and_run_the_world() {
    let world = World::in_memory().unwrap();
    let (recorder, turns) = Recorder::every(TimeSpan::from_mins(1));
    world.register_acting("cat", recorder).unwrap();
    let cat = world.create_entity("cat").unwrap();
    world.entities().mark_acting(cat).unwrap();

    let player = world.create_entity("person").unwrap();
    world.entities().mark_avatar(player).unwrap();

    let outcome = world
        .queue_action(player, world.builtins().wait, None, TimeSpan::from_mins(15))
        .unwrap();
    let QueueOutcome::Queued(pending) = outcome else {
        panic!("avatar wait was rejected");
    };

    // Recorded at the pre-advance time, ready at the post-advance time.
    assert_eq!(pending.event.time, WorldTime(0));
    assert_eq!(world.now(), WorldTime(900_000));
    assert!(world.actions().is_ready(&pending, world.now()).unwrap());
    assert_eq!(turns.lock().len(), 15);
    assert_eq!(
        world.describe_pending(player).unwrap().as_deref(),
        Some("waiting for 15 minutes")
    );

    let narration = world.execute_pending(&pending).unwrap();
    assert_eq!(narration, "Waited for 15 minutes.");
    assert_eq!(world.describe_pending(player).unwrap(), None);
}

#[test]
fn perform_queues_and_executes_in_one_call() {
    let world = World::in_memory().unwrap();
    let player = world.create_entity("person").unwrap();
    world.entities().mark_avatar(player).unwrap();

    let outcome = world
        .perform(player, world.builtins().wait, None, TimeSpan::from_secs(30))
        .unwrap();
    let PerformOutcome::Performed { narration, .. } = outcome else {
        panic!("avatar wait was rejected");
    };
    assert_eq!(narration, "Waited for 30 seconds.");
    assert_eq!(world.now(), WorldTime(30_000));
    assert!(world.actions().pending_action_of(player, world.now()).unwrap().is_none());
}

#[test]
fn busy_autonomous_actor_is_rejected_without_writing() {
    let world = World::in_memory().unwrap();
    let npc = world.create_entity("person").unwrap();
    let wait = world.builtins().wait;

    let first = world
        .queue_action(npc, wait, None, TimeSpan::from_secs(30))
        .unwrap();
    assert!(first.queued().is_some());

    let events_before = world.events().count().unwrap();
    let ids_before = world.ids().current().unwrap();

    let second = world
        .queue_action(npc, wait, None, TimeSpan::from_secs(5))
        .unwrap();
    assert!(matches!(
        second,
        QueueOutcome::Rejected(ref d) if d.reason == RejectionReason::AlreadyBusy
    ));
    assert_eq!(world.events().count().unwrap(), events_before);
    assert_eq!(world.ids().current().unwrap(), ids_before);
}

#[test]
fn avatars_are_never_refused_for_being_busy() {
    let world = World::in_memory().unwrap();
    let player = world.create_entity("person").unwrap();
    world.entities().mark_avatar(player).unwrap();
    let wait = world.builtins().wait;

    world.queue_action(player, wait, None, TimeSpan(10)).unwrap();
    let again = world.queue_action(player, wait, None, TimeSpan(10)).unwrap();
    assert!(again.queued().is_some());
    assert_eq!(world.now(), WorldTime(20));
}

#[test]
fn world_resumes_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ChronicleConfig::default();
    config.world.database_path = dir.path().join("world.db").display().to_string();

    let (ticker, count_before) = {
        let world = World::from_config(&config).unwrap();
        let (recorder, _turns) = Recorder::every(TimeSpan(10));
        world.register_acting("ticker", recorder).unwrap();
        let ticker = world.create_entity("ticker").unwrap();
        world.entities().mark_acting(ticker).unwrap();
        world.advance_to(WorldTime(25)).unwrap();
        (ticker, world.events().count().unwrap())
    };

    let world = World::from_config(&config).unwrap();
    assert_eq!(world.now(), WorldTime(25));
    assert_eq!(world.events().count().unwrap(), count_before);
    assert_eq!(
        world.entities().kind_of(ticker).unwrap(),
        world.intern("ticker").unwrap()
    );

    let (recorder, turns) = Recorder::every(TimeSpan(10));
    world.register_acting("ticker", recorder).unwrap();
    world.advance_to(WorldTime(45)).unwrap();
    assert_eq!(turns.lock().clone(), vec![WorldTime(30), WorldTime(40)]);
}

#[test]
fn invalid_config_is_refused() {
    let mut config = ChronicleConfig::default();
    config.scheduler.default_interval_ms = 0;
    assert!(matches!(
        World::from_config(&config),
        Err(CoreError::Config { .. })
    ));
}

#[test]
fn calendar_follows_the_configured_epoch() {
    let mut config = ChronicleConfig::default();
    config.world.epoch = NaiveDate::from_ymd_opt(1895, 10, 1)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap();
    let world = World::from_config(&config).unwrap();
    world.advance_by(TimeSpan::from_mins(90)).unwrap();
    assert_eq!(
        world.calendar_now(),
        NaiveDate::from_ymd_opt(1895, 10, 1)
            .unwrap()
            .and_hms_opt(7, 30, 0)
    );
}

#[test]
fn concurrent_advances_are_serialised() {
    let world = World::in_memory().unwrap();
    let (recorder, turns) = Recorder::every(TimeSpan(100));
    world.register_acting("ticker", recorder).unwrap();
    let ticker = world.create_entity("ticker").unwrap();
    world.entities().mark_acting(ticker).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..2 {
            scope.spawn(|| {
                for _ in 0..10 {
                    world.advance_by(TimeSpan(1_000)).unwrap();
                }
            });
        }
    });

    assert_eq!(world.now(), WorldTime(20_000));
    let turns = turns.lock().clone();
    assert_eq!(turns.len(), 200);
    assert!(turns.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn negative_duration_is_rejected_before_anything_is_written() {
    let world = World::in_memory().unwrap();
    let hall = world.create_entity("room").unwrap();
    let attic = world.create_entity("room").unwrap();
    let player = world.create_entity("person").unwrap();
    world.entities().mark_avatar(player).unwrap();
    world
        .relationships()
        .add(hall, player, world.types().contains)
        .unwrap();
    world.advance_to(WorldTime(1_000)).unwrap();

    let events_before = world.events().count().unwrap();
    let ids_before = world.ids().current().unwrap();

    let outcome = world
        .queue_action(player, world.builtins().move_to, Some(attic), TimeSpan(-500))
        .unwrap();
    assert!(matches!(
        outcome,
        QueueOutcome::Rejected(ref d) if d.reason == RejectionReason::InvalidProperty
    ));
    assert_eq!(world.now(), WorldTime(1_000));
    assert_eq!(world.events().count().unwrap(), events_before);
    assert_eq!(world.ids().current().unwrap(), ids_before);
    assert_eq!(
        world
            .relationships()
            .first_provider_of(player, world.types().contains, world.now())
            .unwrap(),
        Some(hall)
    );
}

#[test]
fn writes_from_other_threads_never_land_behind_the_clock() {
    let world = World::in_memory().unwrap();
    let (recorder, _turns) = Recorder::every(TimeSpan(1));
    world.register_acting("ticker", recorder).unwrap();
    let ticker = world.create_entity("ticker").unwrap();
    world.entities().mark_acting(ticker).unwrap();
    let lamp = world.create_entity("lamp").unwrap();
    let hall = world.create_entity("room").unwrap();
    let lit = world.intern("entity_tag_lit").unwrap();
    let contains = world.types().contains;

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..50 {
                world.advance_by(TimeSpan(20)).unwrap();
            }
        });
        scope.spawn(|| {
            for value in 0..200 {
                world.tags().set_value(lamp, lit, value).unwrap();
                world.relationships().move_receiver(lamp, contains, hall).unwrap();
            }
        });
    });

    // Every append is stamped with the clock at the moment it is written,
    // so log order and time order agree.
    let times: Vec<i64> = world
        .store()
        .with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT time FROM event ORDER BY event_order")?;
            let times = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            Ok(times)
        })
        .unwrap();
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(world.now(), WorldTime(1_000));
    assert_eq!(world.tags().value(lamp, lit, world.now()).unwrap(), Some(199));
}
