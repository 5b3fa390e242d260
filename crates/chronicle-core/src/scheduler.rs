//! Acting scheduler: the fair, time-ordered loop that advances the world.
//!
//! One call to [`Scheduler::advance_to`] moves the world clock from "now"
//! to a target time, processing every scheduled entity whose turn falls in
//! between, in time order. Two kinds of turn share one queue: acting turns
//! (the entity may run a ready action and decide what to do next) and ticks
//! (the entity ages by the time since its previous tick).
//!
//! 1. **Plan** -- for each entity tagged acting, compute when it is next
//!    due: its last processed time (or creation time) plus its interval, or
//!    the ready time of its pending action if that is sooner. Each entity
//!    tagged tickable is due at its last tick (or creation time) plus its
//!    tick interval. Due times that fall before the start of the pass are
//!    clamped to the start, so the clock never goes backwards. Entities due
//!    after the target are skipped.
//!
//! 2. **Step** -- pop the earliest `(due, entity, turn)`; ties break on the
//!    smaller entity id, then ticks before acting turns. Move the clock to
//!    `due`. A tick calls the entity's tickable behaviour. An acting turn
//!    executes the entity's pending action if it is ready and then lets the
//!    entity decide; with none pending it just decides; if it is still
//!    busy, nothing happens. Record `due` in the turn's own last-processed
//!    tag and schedule the next turn of the same kind.
//!
//! 3. **Finish** -- pin the clock to exactly the target.
//!
//! The pass is deterministic given the same store contents and behaviours.
//! A pass cannot start while another is running on the same world.
//!
//! Entities that become acting or tickable during a pass are picked up by
//! the next one.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};

use chronicle_types::{EntityId, TimeSpan, TypeHandle, WorldTime};
use tracing::{debug, info, warn};

use crate::acting::Acting;
use crate::error::CoreError;
use crate::ticking::Tickable;
use crate::world::World;

/// What a pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceSummary {
    /// Turns processed, acting and ticks together.
    pub steps: u64,
    /// Pending actions executed.
    pub actions_executed: u64,
    /// Decision callbacks invoked.
    pub decisions: u64,
    /// Tick callbacks invoked.
    pub ticks: u64,
    /// Clock value at the end of the pass.
    pub final_time: WorldTime,
}

/// Holds the "pass in progress" flag.
#[derive(Debug, Default)]
pub struct Scheduler {
    running: AtomicBool,
}

/// Clears the running flag when a pass ends, including by error.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Result<Self, CoreError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_was_running| CoreError::SchedulerBusy)?;
        Ok(Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Which side of an entity a queued turn drives. Ticks sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Turn {
    Tick,
    Act,
}

type DueQueue = BinaryHeap<Reverse<(WorldTime, EntityId, Turn)>>;

impl Scheduler {
    /// Create an idle scheduler.
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    /// Whether a pass is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Advance the world clock to `target`, processing every acting and
    /// tickable entity due on the way.
    ///
    /// Callers are expected to hold the world gate.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SchedulerBusy`] if a pass is already running,
    /// [`CoreError::ClockRegression`] if `target` is before now, or any
    /// error raised by a behaviour or action kind.
    pub fn advance_to(&self, world: &World, target: WorldTime) -> Result<AdvanceSummary, CoreError> {
        let _running = RunningGuard::enter(&self.running)?;

        let start = world.now();
        if target < start {
            return Err(CoreError::ClockRegression {
                current: start,
                requested: target,
            });
        }

        let types = *world.types();
        let mut queue = DueQueue::new();
        for entity in world.tags().entities_with(types.acting, start)? {
            let Some(behaviour) = world.acting_for(entity)? else {
                warn!(%entity, "Acting entity has no registered behaviour, skipping");
                continue;
            };
            let due = initial_due(world, behaviour.as_ref(), entity, start)?;
            if due <= target {
                queue.push(Reverse((due, entity, Turn::Act)));
            }
        }
        for entity in world.tags().entities_with(types.tickable, start)? {
            let Some(behaviour) = world.tickable_for(entity)? else {
                warn!(%entity, "Tickable entity has no registered behaviour, skipping");
                continue;
            };
            let due = initial_tick(world, behaviour.as_ref(), entity, start)?;
            if due <= target {
                queue.push(Reverse((due, entity, Turn::Tick)));
            }
        }
        debug!(start = start.0, target = target.0, queued = queue.len(), "Scheduler pass planned");

        let mut summary = AdvanceSummary {
            final_time: target,
            ..AdvanceSummary::default()
        };

        while let Some(Reverse((due, entity, turn))) = queue.pop() {
            world.clock().set(due)?;
            let next = match turn {
                Turn::Act => {
                    if !world.tags().has(entity, types.acting, due)? {
                        debug!(%entity, due = due.0, "Entity stopped acting, dropping from pass");
                        continue;
                    }
                    let Some(behaviour) = world.acting_for(entity)? else {
                        continue;
                    };
                    step(world, behaviour.as_ref(), entity, due, &mut summary)?;
                    next_due(world, behaviour.as_ref(), entity, due)?
                }
                Turn::Tick => {
                    if !world.tags().has(entity, types.tickable, due)? {
                        debug!(%entity, due = due.0, "Entity stopped ticking, dropping from pass");
                        continue;
                    }
                    let Some(behaviour) = world.tickable_for(entity)? else {
                        continue;
                    };
                    tick(world, behaviour.as_ref(), entity, due, &mut summary)?;
                    let interval = usable_interval(world, entity, behaviour.interval(world, entity));
                    offset(due, interval)?
                }
            };
            if next <= target {
                queue.push(Reverse((next, entity, turn)));
            }
        }

        world.clock().set(target)?;
        info!(
            start = start.0,
            end = target.0,
            steps = summary.steps,
            actions_executed = summary.actions_executed,
            decisions = summary.decisions,
            ticks = summary.ticks,
            "Scheduler pass complete"
        );
        Ok(summary)
    }
}

/// One acting turn at `due`.
fn step(
    world: &World,
    behaviour: &dyn Acting,
    entity: EntityId,
    due: WorldTime,
    summary: &mut AdvanceSummary,
) -> Result<(), CoreError> {
    let pending = world.actions().pending_action_of(entity, due)?;
    let decide = match pending {
        Some(pending) if world.actions().is_ready(&pending, due)? => {
            world.execute_pending(&pending)?;
            summary.actions_executed = summary.actions_executed.saturating_add(1);
            true
        }
        Some(_) => false,
        None => true,
    };

    if decide {
        debug!(%entity, due = due.0, "Entity deciding");
        behaviour.decide(world, entity)?;
        summary.decisions = summary.decisions.saturating_add(1);
    }

    world
        .tags()
        .set_value(entity, world.types().last_action_check, due.as_millis())?;
    summary.steps = summary.steps.saturating_add(1);
    Ok(())
}

/// One tick at `due`.
fn tick(
    world: &World,
    behaviour: &dyn Tickable,
    entity: EntityId,
    due: WorldTime,
    summary: &mut AdvanceSummary,
) -> Result<(), CoreError> {
    let last_tick = world.types().last_tick;
    let since_last = last_processed(world, entity, last_tick, due)?
        .and_then(|last| due.checked_since(last))
        .unwrap_or(TimeSpan::ZERO);
    debug!(%entity, due = due.0, since_last = since_last.0, "Entity ticking");
    behaviour.on_tick(world, entity, since_last)?;

    world.tags().set_value(entity, last_tick, due.as_millis())?;
    summary.ticks = summary.ticks.saturating_add(1);
    summary.steps = summary.steps.saturating_add(1);
    Ok(())
}

/// `interval`, or the world default if it is non-positive (which would
/// never advance).
fn usable_interval(world: &World, entity: EntityId, interval: TimeSpan) -> TimeSpan {
    if interval.is_empty() {
        warn!(%entity, interval = interval.0, "Non-positive scheduling interval, using default");
        return world.default_interval();
    }
    interval
}

fn interval_of(world: &World, behaviour: &dyn Acting, entity: EntityId) -> TimeSpan {
    usable_interval(world, entity, behaviour.interval(world, entity))
}

fn offset(base: WorldTime, interval: TimeSpan) -> Result<WorldTime, CoreError> {
    base.checked_add(interval).ok_or(CoreError::TimeOverflow {
        context: "scheduling the next turn",
    })
}

/// The value of `tag` as a time, falling back to the creation time.
fn last_processed(
    world: &World,
    entity: EntityId,
    tag: TypeHandle,
    at: WorldTime,
) -> Result<Option<WorldTime>, CoreError> {
    let tags = world.tags();
    match tags.value(entity, tag, at)? {
        Some(last) => Ok(Some(WorldTime(last))),
        None => Ok(tags
            .value(entity, world.types().entity_created, at)?
            .map(WorldTime)),
    }
}

/// `min(base + interval, ready time of pending action)`, checked.
fn due_from(
    world: &World,
    behaviour: &dyn Acting,
    entity: EntityId,
    base: WorldTime,
    at: WorldTime,
) -> Result<WorldTime, CoreError> {
    let mut due = offset(base, interval_of(world, behaviour, entity))?;
    if let Some(pending) = world.actions().pending_action_of(entity, at)? {
        let ready = world.actions().ready_time(&pending)?;
        if ready < due {
            due = ready;
        }
    }
    Ok(due)
}

/// First acting turn of a pass: last processed (or created) time plus
/// interval, clamped to the start of the pass.
fn initial_due(
    world: &World,
    behaviour: &dyn Acting,
    entity: EntityId,
    start: WorldTime,
) -> Result<WorldTime, CoreError> {
    let base = last_processed(world, entity, world.types().last_action_check, start)?
        .unwrap_or(start);
    let due = due_from(world, behaviour, entity, base, start)?;
    Ok(due.max(start))
}

/// First tick of a pass, clamped like [`initial_due`].
fn initial_tick(
    world: &World,
    behaviour: &dyn Tickable,
    entity: EntityId,
    start: WorldTime,
) -> Result<WorldTime, CoreError> {
    let base = last_processed(world, entity, world.types().last_tick, start)?.unwrap_or(start);
    let interval = usable_interval(world, entity, behaviour.interval(world, entity));
    Ok(offset(base, interval)?.max(start))
}

/// Acting turn after one processed at `due`. A pending action that becomes
/// ready strictly later than `due` but before the regular interval pulls
/// the next turn forward.
fn next_due(
    world: &World,
    behaviour: &dyn Acting,
    entity: EntityId,
    due: WorldTime,
) -> Result<WorldTime, CoreError> {
    let next = due_from(world, behaviour, entity, due, due)?;
    // A ready time at or before `due` belongs to an action that could not run
    // this turn; it is retried on the regular interval.
    if next <= due {
        return offset(due, interval_of(world, behaviour, entity));
    }
    Ok(next)
}
