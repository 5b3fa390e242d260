//! The world context: every subsystem, wired once at startup.
//!
//! A [`World`] owns the store and each service built on it, the behaviour
//! tables for action kinds, acting entities and tickable entities, and the
//! scheduler. It is
//! passed by reference to every behaviour callback; there is no global
//! state.
//!
//! # Concurrency
//!
//! Every store call is serialised by the store's connection mutex. On top
//! of that the world holds a re-entrant gate taken by each mutating entry
//! point ([`World::queue_action`], [`World::perform`],
//! [`World::execute_pending`], [`World::advance_to`]). A scheduler pass and
//! a request arriving from another thread are therefore atomic relative to
//! each other, while behaviour callbacks running on the scheduler thread
//! may call back into the world freely.
//!
//! Writes made straight through the tag, relationship and entity services
//! do not take the gate. They are stamped while holding the clock
//! ([`WorldClock::hold`]), so a pass on another thread cannot move the
//! clock past them mid-write.

use std::sync::Arc;

use chrono::NaiveDateTime;
use chronicle_db::Store;
use chronicle_types::{
    Action, EntityId, PendingAction, RejectionDetails, RejectionReason, TimeSpan, TypeHandle,
    Validation, WorldTime,
};
use parking_lot::ReentrantMutex;
use tracing::{debug, info, warn};

use crate::acting::{Acting, ActingRegistry};
use crate::actions::{ActionKind, ActionKinds, ActionStore, PerformOutcome, QueueOutcome};
use crate::builtin::{self, BuiltinKinds};
use crate::clock::WorldClock;
use crate::config::ChronicleConfig;
use crate::entities::Entities;
use crate::error::CoreError;
use crate::event_log::EventLog;
use crate::ids::IdAllocator;
use crate::registry::{CoreTypes, TypeRegistry};
use crate::relationships::Relationships;
use crate::scheduler::{AdvanceSummary, Scheduler};
use crate::tags::Tags;
use crate::ticking::{Tickable, TickingRegistry};

/// A running world.
pub struct World {
    name: String,
    store: Arc<Store>,
    registry: TypeRegistry,
    types: CoreTypes,
    ids: IdAllocator,
    clock: Arc<WorldClock>,
    log: Arc<EventLog>,
    relationships: Relationships,
    tags: Arc<Tags>,
    entities: Entities,
    actions: ActionStore,
    action_kinds: ActionKinds,
    acting: ActingRegistry,
    ticking: TickingRegistry,
    scheduler: Scheduler,
    default_interval: TimeSpan,
    builtins: BuiltinKinds,
    gate: ReentrantMutex<()>,
}

impl World {
    /// Open the store named by the configuration and build a world on it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the store cannot be opened or
    /// migrated, or [`CoreError::Config`] if the configuration is invalid.
    pub fn from_config(config: &ChronicleConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let store = Store::open(&config.world.database_path)?;
        Self::with_store(Arc::new(store), config)
    }

    /// A throwaway in-memory world with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the schema cannot be created.
    pub fn in_memory() -> Result<Self, CoreError> {
        Self::with_store(Arc::new(Store::in_memory()?), &ChronicleConfig::default())
    }

    /// Build a world over an already opened store.
    ///
    /// Interns the core labels, loads (or initialises) the clock, and
    /// registers the built-in action kinds.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the store cannot be read or written.
    pub fn with_store(store: Arc<Store>, config: &ChronicleConfig) -> Result<Self, CoreError> {
        let registry = TypeRegistry::new(Arc::clone(&store));
        let types = CoreTypes::intern_all(&registry)?;
        let ids = IdAllocator::new(Arc::clone(&store));
        let clock = Arc::new(WorldClock::load(
            Arc::clone(&store),
            WorldTime(config.world.start_time_ms),
            config.world.epoch,
        )?);
        let log = Arc::new(EventLog::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            types.event_cancel,
        ));
        let relationships = Relationships::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&log),
            types,
        );
        let tags = Arc::new(Tags::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&log),
            types,
        ));
        let entities = Entities::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&tags),
            types,
        );
        let actions = ActionStore::new(Arc::clone(&store), Arc::clone(&log), types);
        let action_kinds = ActionKinds::default();
        let builtins = builtin::register(&registry, &action_kinds)?;

        info!(
            world = %config.world.name,
            now = clock.now().0,
            default_interval_ms = config.scheduler.default_interval_ms,
            "World ready"
        );

        Ok(Self {
            name: config.world.name.clone(),
            store,
            registry,
            types,
            ids,
            clock,
            log,
            relationships,
            tags,
            entities,
            actions,
            action_kinds,
            acting: ActingRegistry::default(),
            ticking: TickingRegistry::default(),
            scheduler: Scheduler::new(),
            default_interval: TimeSpan(config.scheduler.default_interval_ms),
            builtins,
            gate: ReentrantMutex::new(()),
        })
    }

    // -- accessors --------------------------------------------------------

    /// The world's configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backing store.
    pub const fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// The type registry.
    pub const fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Handles of the labels the core depends on.
    pub const fn types(&self) -> &CoreTypes {
        &self.types
    }

    /// The global id allocator.
    pub const fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// The world clock.
    pub fn clock(&self) -> &WorldClock {
        &self.clock
    }

    /// Current world time.
    pub fn now(&self) -> WorldTime {
        self.clock.now()
    }

    /// Current world time on the configured calendar.
    pub fn calendar_now(&self) -> Option<NaiveDateTime> {
        self.clock.calendar(self.clock.now())
    }

    /// The event log.
    pub fn events(&self) -> &EventLog {
        &self.log
    }

    /// The relationship store.
    pub const fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    /// The tag store.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// The entity service.
    pub const fn entities(&self) -> &Entities {
        &self.entities
    }

    /// The action store.
    pub const fn actions(&self) -> &ActionStore {
        &self.actions
    }

    /// Handles of the built-in action kinds.
    pub const fn builtins(&self) -> &BuiltinKinds {
        &self.builtins
    }

    /// Scheduler interval for behaviours that do not choose their own.
    pub const fn default_interval(&self) -> TimeSpan {
        self.default_interval
    }

    /// Intern a label.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the registry cannot be updated.
    pub fn intern(&self, label: &str) -> Result<TypeHandle, CoreError> {
        self.registry.intern(label)
    }

    // -- registration -----------------------------------------------------

    /// Register the behaviour of the action kind `label`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the label cannot be interned.
    pub fn register_action_kind(
        &self,
        label: &str,
        behaviour: Arc<dyn ActionKind>,
    ) -> Result<TypeHandle, CoreError> {
        let kind = self.registry.intern(label)?;
        self.action_kinds.register(kind, behaviour);
        debug!(label, %kind, "Registered action kind");
        Ok(kind)
    }

    /// Register the acting behaviour for entities of kind `kind_label`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the label cannot be interned.
    pub fn register_acting(
        &self,
        kind_label: &str,
        behaviour: Arc<dyn Acting>,
    ) -> Result<TypeHandle, CoreError> {
        let kind = self.registry.intern(kind_label)?;
        self.acting.register(kind, behaviour);
        debug!(label = kind_label, %kind, "Registered acting behaviour");
        Ok(kind)
    }

    /// The acting behaviour of `entity`, resolved through its kind.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the entity does not exist.
    pub fn acting_for(&self, entity: EntityId) -> Result<Option<Arc<dyn Acting>>, CoreError> {
        let kind = self.entities.kind_of(entity)?;
        Ok(self.acting.for_kind(kind))
    }

    /// Register the tickable behaviour for entities of kind `kind_label`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the label cannot be interned.
    pub fn register_tickable(
        &self,
        kind_label: &str,
        behaviour: Arc<dyn Tickable>,
    ) -> Result<TypeHandle, CoreError> {
        let kind = self.registry.intern(kind_label)?;
        self.ticking.register(kind, behaviour);
        debug!(label = kind_label, %kind, "Registered tickable behaviour");
        Ok(kind)
    }

    /// The tickable behaviour of `entity`, resolved through its kind.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the entity does not exist.
    pub fn tickable_for(&self, entity: EntityId) -> Result<Option<Arc<dyn Tickable>>, CoreError> {
        let kind = self.entities.kind_of(entity)?;
        Ok(self.ticking.for_kind(kind))
    }

    /// Create an entity of kind `kind_label` at the current world time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the transaction fails.
    pub fn create_entity(&self, kind_label: &str) -> Result<EntityId, CoreError> {
        let kind = self.registry.intern(kind_label)?;
        self.entities.create(kind)
    }

    // -- actions ----------------------------------------------------------

    /// Queue an action for `actor`.
    ///
    /// An autonomous actor (anything not tagged avatar) that already has a
    /// pending action is refused before anything is written, as is a
    /// negative duration. Otherwise the action row is created and
    /// validated; a rejection leaves the event log untouched.
    ///
    /// For an avatar the world first advances by `duration` (so every other
    /// acting entity gets its turns in order) and the queueing event is then
    /// recorded at the pre-advance time, which makes the action immediately
    /// ready.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownType`] if no behaviour is registered for
    /// `kind`, [`CoreError::SchedulerBusy`] if an avatar action arrives
    /// during a scheduler pass, or any storage fault.
    pub fn queue_action(
        &self,
        actor: EntityId,
        kind: TypeHandle,
        target: Option<EntityId>,
        duration: TimeSpan,
    ) -> Result<QueueOutcome, CoreError> {
        self.queue_action_with(actor, kind, target, duration, &[])
    }

    /// [`World::queue_action`] for kinds that need more than the standard
    /// properties. `extra` is written before validation runs.
    ///
    /// # Errors
    ///
    /// Same as [`World::queue_action`].
    pub fn queue_action_with(
        &self,
        actor: EntityId,
        kind: TypeHandle,
        target: Option<EntityId>,
        duration: TimeSpan,
        extra: &[(TypeHandle, i64)],
    ) -> Result<QueueOutcome, CoreError> {
        let _gate = self.gate.lock();
        let now = self.clock.now();
        let avatar = self.entities.is_avatar(actor)?;

        let busy = if avatar {
            None
        } else {
            self.actions.pending_action_of(actor, now)?
        };
        if let Some(busy) = busy {
            let details = RejectionDetails::new(
                RejectionReason::AlreadyBusy,
                "Already busy with another action.",
            );
            warn!(%actor, pending = %busy.action.id, "Rejected action: actor already busy");
            return Ok(QueueOutcome::Rejected(details));
        }

        let behaviour = self.action_kinds.require(kind)?;
        if duration.as_millis() < 0 {
            let details = RejectionDetails::new(
                RejectionReason::InvalidProperty,
                "An action cannot take a negative amount of time.",
            );
            debug!(%actor, %kind, duration = duration.0, "Rejected action: negative duration");
            return Ok(QueueOutcome::Rejected(details));
        }
        let action = self
            .actions
            .create_with(kind, actor, target, duration, extra)?;

        if let Validation::Rejected(details) = behaviour.validate(self, &action)? {
            if avatar {
                debug!(%actor, action = %action.id, %details, "Avatar action rejected");
            } else {
                warn!(%actor, action = %action.id, %details, "Skipping decision: action rejected");
            }
            return Ok(QueueOutcome::Rejected(details));
        }

        if avatar {
            let until = self.clock.after(duration)?;
            self.advance_to(until)?;
        }

        let event = self.actions.record_queued(action.id, now)?;
        debug!(%actor, action = %action.id, %kind, at = now.0, "Queued action");
        Ok(QueueOutcome::Queued(PendingAction { action, event }))
    }

    /// Queue an action and, if accepted, execute it at once.
    ///
    /// Intended for avatars, whose actions are ready as soon as they are
    /// queued. The action is executed without waiting for its ready time,
    /// so an autonomous actor calling this skips the wait.
    ///
    /// # Errors
    ///
    /// Same as [`World::queue_action`] and [`World::execute_pending`].
    pub fn perform(
        &self,
        actor: EntityId,
        kind: TypeHandle,
        target: Option<EntityId>,
        duration: TimeSpan,
    ) -> Result<PerformOutcome, CoreError> {
        let _gate = self.gate.lock();
        match self.queue_action(actor, kind, target, duration)? {
            QueueOutcome::Queued(pending) => {
                let narration = self.execute_pending(&pending)?;
                Ok(PerformOutcome::Performed {
                    action: pending.action,
                    narration,
                })
            }
            QueueOutcome::Rejected(details) => Ok(PerformOutcome::Rejected(details)),
        }
    }

    /// Run a pending action's effects and retire it at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownType`] if the kind has no behaviour, or
    /// any error raised by the kind's `execute`.
    pub fn execute_pending(&self, pending: &PendingAction) -> Result<String, CoreError> {
        let _gate = self.gate.lock();
        let action: &Action = &pending.action;
        let behaviour = self.action_kinds.require(action.kind)?;
        let narration = behaviour.execute(self, action)?;
        self.actions.complete(pending, self.clock.now())?;
        debug!(action = %action.id, kind = %action.kind, at = self.clock.now().0, %narration, "Executed action");
        Ok(narration)
    }

    /// Describe what `actor` is currently doing, if anything.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownType`] if the pending action's kind has
    /// no behaviour, or any storage fault.
    pub fn describe_pending(&self, actor: EntityId) -> Result<Option<String>, CoreError> {
        let Some(pending) = self.actions.pending_action_of(actor, self.clock.now())? else {
            return Ok(None);
        };
        let behaviour = self.action_kinds.require(pending.action.kind)?;
        behaviour.describe(self, &pending.action).map(Some)
    }

    // -- time -------------------------------------------------------------

    /// Advance the world by `span`.
    ///
    /// # Errors
    ///
    /// See [`World::advance_to`].
    pub fn advance_by(&self, span: TimeSpan) -> Result<AdvanceSummary, CoreError> {
        let _gate = self.gate.lock();
        let target = self.clock.after(span)?;
        self.advance_to(target)
    }

    /// Advance the world to `target`, running every acting and tickable
    /// entity due on the way.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SchedulerBusy`] if called from inside a pass,
    /// [`CoreError::ClockRegression`] if `target` is in the past, or any
    /// error raised by a behaviour.
    pub fn advance_to(&self, target: WorldTime) -> Result<AdvanceSummary, CoreError> {
        let _gate = self.gate.lock();
        self.scheduler.advance_to(self, target)
    }
}

impl core::fmt::Debug for World {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("World")
            .field("name", &self.name)
            .field("now", &self.clock.now())
            .field("action_kinds", &self.action_kinds)
            .field("acting", &self.acting)
            .field("ticking", &self.ticking)
            .finish_non_exhaustive()
    }
}
