//! Type registry: interning string labels to stable integer handles.
//!
//! Event types, relationship verbs, tag types, action kinds, property keys
//! and entity kinds are all named by a string label and stored by handle.
//! A handle is allocated from the global id sequence the first time a
//! label is interned and never changes or gets reclaimed afterwards.
//!
//! Lookups go memory cache, then backing store, then allocation. The cache
//! is an optimisation only; the store is authoritative.

use std::collections::BTreeMap;
use std::sync::Arc;

use chronicle_db::{Store, ids, types};
use chronicle_types::TypeHandle;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::CoreError;

/// Labels the core itself depends on.
pub mod labels {
    /// Event type of cancellation events.
    pub const EVENT_CANCEL: &str = "event_cancel";
    /// Event type that creates a relationship edge.
    pub const RELATIONSHIP: &str = "relationship";
    /// Event type that creates an entity tag.
    pub const ENTITY_TAG: &str = "entity_tag";
    /// Event type that queues an action.
    pub const ACTION: &str = "action";
    /// Tag marking an entity as driven by the scheduler.
    pub const TAG_ACTING: &str = "entity_tag_acting";
    /// Tag holding the world time an acting entity was last processed.
    pub const TAG_LAST_ACTION_CHECK: &str = "entity_tag_last_action_check";
    /// Tag marking an entity as ticked by the scheduler.
    pub const TAG_TICKABLE: &str = "entity_tag_tickable";
    /// Tag holding the world time a tickable entity was last ticked.
    pub const TAG_LAST_TICK: &str = "entity_tag_last_tick";
    /// Tag holding the world time an entity was created.
    pub const TAG_ENTITY_CREATED: &str = "entity_tag_entity_created";
    /// Tag marking an entity as player-controlled.
    pub const TAG_AVATAR: &str = "entity_tag_avatar";
    /// Relationship verb for containment (provider contains receiver).
    pub const VERB_CONTAINS: &str = "contains";
    /// Action property: the acting entity.
    pub const PROP_ACTOR: &str = "action_prop_actor";
    /// Action property: the entity acted upon.
    pub const PROP_TARGET: &str = "action_prop_target";
    /// Action property: how long the action takes (ms).
    pub const PROP_DURATION: &str = "action_prop_duration";
}

/// Interns labels to [`TypeHandle`]s.
pub struct TypeRegistry {
    store: Arc<Store>,
    by_label: RwLock<BTreeMap<String, TypeHandle>>,
    by_handle: RwLock<BTreeMap<TypeHandle, String>>,
}

impl TypeRegistry {
    /// Create a registry over the given store with an empty cache.
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            by_label: RwLock::new(BTreeMap::new()),
            by_handle: RwLock::new(BTreeMap::new()),
        }
    }

    /// Return the handle for `label`, allocating one on first use.
    ///
    /// Interning the same label twice, in this process or across a reopen
    /// of the same store, yields the same handle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the store cannot be read or written.
    pub fn intern(&self, label: &str) -> Result<TypeHandle, CoreError> {
        if let Some(handle) = self.by_label.read().get(label) {
            return Ok(*handle);
        }

        let (raw, created) = self.store.with_tx(|tx| {
            if let Some(existing) = types::handle_of(tx, label)? {
                return Ok((existing, false));
            }
            let handle = ids::next(tx)?;
            types::insert(tx, label, handle)?;
            Ok((handle, true))
        })?;
        let handle = TypeHandle(raw);
        if created {
            debug!(label, %handle, "Registered new type label");
        }

        self.remember(label, handle);
        Ok(handle)
    }

    /// Reverse lookup, `None` if the handle was never issued.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the store cannot be read.
    pub fn label(&self, handle: TypeHandle) -> Result<Option<String>, CoreError> {
        if let Some(label) = self.by_handle.read().get(&handle) {
            return Ok(Some(label.clone()));
        }
        let label = self
            .store
            .with_conn(|conn| types::label_of(conn, handle.into_inner()))?;
        if let Some(ref found) = label {
            self.remember(found, handle);
        }
        Ok(label)
    }

    /// Reverse lookup that treats a missing label as an integrity fault.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownType`] if the handle was never issued.
    pub fn require_label(&self, handle: TypeHandle) -> Result<String, CoreError> {
        self.label(handle)?.ok_or(CoreError::UnknownType {
            handle,
            context: "label lookup",
        })
    }

    fn remember(&self, label: &str, handle: TypeHandle) {
        self.by_label.write().insert(label.to_owned(), handle);
        self.by_handle.write().insert(handle, label.to_owned());
    }
}

impl core::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("cached", &self.by_label.read().len())
            .finish_non_exhaustive()
    }
}

/// Handles for every label in [`labels`], resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreTypes {
    /// `event_cancel`
    pub event_cancel: TypeHandle,
    /// `relationship`
    pub relationship: TypeHandle,
    /// `entity_tag`
    pub entity_tag: TypeHandle,
    /// `action`
    pub action: TypeHandle,
    /// `entity_tag_acting`
    pub acting: TypeHandle,
    /// `entity_tag_last_action_check`
    pub last_action_check: TypeHandle,
    /// `entity_tag_tickable`
    pub tickable: TypeHandle,
    /// `entity_tag_last_tick`
    pub last_tick: TypeHandle,
    /// `entity_tag_entity_created`
    pub entity_created: TypeHandle,
    /// `entity_tag_avatar`
    pub avatar: TypeHandle,
    /// `contains`
    pub contains: TypeHandle,
    /// `action_prop_actor`
    pub prop_actor: TypeHandle,
    /// `action_prop_target`
    pub prop_target: TypeHandle,
    /// `action_prop_duration`
    pub prop_duration: TypeHandle,
}

impl CoreTypes {
    /// Intern every core label.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if interning fails.
    pub fn intern_all(registry: &TypeRegistry) -> Result<Self, CoreError> {
        Ok(Self {
            event_cancel: registry.intern(labels::EVENT_CANCEL)?,
            relationship: registry.intern(labels::RELATIONSHIP)?,
            entity_tag: registry.intern(labels::ENTITY_TAG)?,
            action: registry.intern(labels::ACTION)?,
            acting: registry.intern(labels::TAG_ACTING)?,
            last_action_check: registry.intern(labels::TAG_LAST_ACTION_CHECK)?,
            tickable: registry.intern(labels::TAG_TICKABLE)?,
            last_tick: registry.intern(labels::TAG_LAST_TICK)?,
            entity_created: registry.intern(labels::TAG_ENTITY_CREATED)?,
            avatar: registry.intern(labels::TAG_AVATAR)?,
            contains: registry.intern(labels::VERB_CONTAINS)?,
            prop_actor: registry.intern(labels::PROP_ACTOR)?,
            prop_target: registry.intern(labels::PROP_TARGET)?,
            prop_duration: registry.intern(labels::PROP_DURATION)?,
        })
    }
}
