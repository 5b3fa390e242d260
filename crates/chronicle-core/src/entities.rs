//! Entity creation and the flags the core cares about.
//!
//! An entity is just an id with a recorded kind. Creating one also tags it
//! with its creation time, which the scheduler uses as the baseline for the
//! first turn of an acting or tickable entity that has never been processed.

use std::sync::Arc;

use chronicle_db::{Store, entities, ids};
use chronicle_types::{EntityId, TagEdge, TypeHandle, WorldTime};
use tracing::info;

use crate::clock::WorldClock;
use crate::error::CoreError;
use crate::registry::CoreTypes;
use crate::tags::Tags;

/// Entity service.
#[derive(Debug)]
pub struct Entities {
    store: Arc<Store>,
    clock: Arc<WorldClock>,
    tags: Arc<Tags>,
    types: CoreTypes,
}

impl Entities {
    /// Build the entity service.
    pub const fn new(
        store: Arc<Store>,
        clock: Arc<WorldClock>,
        tags: Arc<Tags>,
        types: CoreTypes,
    ) -> Self {
        Self {
            store,
            clock,
            tags,
            types,
        }
    }

    /// Create an entity of `kind` at the current world time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the transaction fails.
    pub fn create(&self, kind: TypeHandle) -> Result<EntityId, CoreError> {
        let CoreTypes {
            entity_tag,
            entity_created,
            ..
        } = self.types;
        let (id, now) = self.clock.hold(|now| {
            let id = self.store.with_tx(|tx| {
                let id = EntityId(ids::next(tx)?);
                entities::insert(tx, id, kind)?;
                Tags::add_in(tx, entity_tag, id, entity_created, Some(now.as_millis()), now)?;
                Ok(id)
            })?;
            Ok((id, now))
        })?;
        info!(entity = %id, %kind, at = now.0, "Created entity");
        Ok(id)
    }

    /// The kind `entity` was created as.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no such entity exists.
    pub fn kind_of(&self, entity: EntityId) -> Result<TypeHandle, CoreError> {
        self.store
            .with_conn(|conn| entities::kind_of(conn, entity))?
            .ok_or(CoreError::NotFound {
                what: "entity",
                id: entity.into_inner(),
            })
    }

    /// Whether `entity` exists.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn exists(&self, entity: EntityId) -> Result<bool, CoreError> {
        Ok(self
            .store
            .with_conn(|conn| entities::kind_of(conn, entity))?
            .is_some())
    }

    /// Every entity of `kind`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn of_kind(&self, kind: TypeHandle) -> Result<Vec<EntityId>, CoreError> {
        Ok(self.store.with_conn(|conn| entities::of_kind(conn, kind))?)
    }

    /// World time `entity` was created, from its creation tag.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the entity has no creation tag.
    pub fn created_at(&self, entity: EntityId) -> Result<WorldTime, CoreError> {
        self.tags
            .value(entity, self.types.entity_created, self.clock.now())?
            .map(WorldTime)
            .ok_or(CoreError::NotFound {
                what: "entity creation tag",
                id: entity.into_inner(),
            })
    }

    /// Mark `entity` as player-controlled.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the transaction fails.
    pub fn mark_avatar(&self, entity: EntityId) -> Result<TagEdge, CoreError> {
        self.tags.add(entity, self.types.avatar, None)
    }

    /// Mark `entity` as driven by the acting scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the transaction fails.
    pub fn mark_acting(&self, entity: EntityId) -> Result<TagEdge, CoreError> {
        self.tags.add(entity, self.types.acting, None)
    }

    /// Mark `entity` as ticked by the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the transaction fails.
    pub fn mark_tickable(&self, entity: EntityId) -> Result<TagEdge, CoreError> {
        self.tags.add(entity, self.types.tickable, None)
    }

    /// Whether `entity` is an avatar now.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn is_avatar(&self, entity: EntityId) -> Result<bool, CoreError> {
        self.tags.has(entity, self.types.avatar, self.clock.now())
    }

    /// Whether `entity` is acting now.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn is_acting(&self, entity: EntityId) -> Result<bool, CoreError> {
        self.tags.has(entity, self.types.acting, self.clock.now())
    }

    /// Whether `entity` is tickable now.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the query fails.
    pub fn is_tickable(&self, entity: EntityId) -> Result<bool, CoreError> {
        self.tags.has(entity, self.types.tickable, self.clock.now())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chronicle_types::{EntityId, WorldTime};

    use crate::error::CoreError;
    use crate::world::World;

    #[test]
    fn create_records_kind_and_creation_time() {
        let world = World::in_memory().unwrap();
        world.clock().set(WorldTime(250)).unwrap();
        let lamp = world.create_entity("lamp").unwrap();
        let kind = world.intern("lamp").unwrap();

        let entities = world.entities();
        assert_eq!(entities.kind_of(lamp).unwrap(), kind);
        assert_eq!(entities.created_at(lamp).unwrap(), WorldTime(250));
        assert_eq!(entities.of_kind(kind).unwrap(), vec![lamp]);
        assert!(entities.exists(lamp).unwrap());
    }

    #[test]
    fn unknown_entity_is_not_found() {
        let world = World::in_memory().unwrap();
        let missing = EntityId(9_999);
        assert!(!world.entities().exists(missing).unwrap());
        assert!(matches!(
            world.entities().kind_of(missing),
            Err(CoreError::NotFound { what: "entity", .. })
        ));
    }

    #[test]
    fn flags_are_tags() {
        let world = World::in_memory().unwrap();
        let player = world.create_entity("person").unwrap();
        let clock = world.create_entity("clock").unwrap();
        world.entities().mark_avatar(player).unwrap();
        world.entities().mark_acting(clock).unwrap();
        world.entities().mark_tickable(clock).unwrap();

        let entities = world.entities();
        assert!(entities.is_avatar(player).unwrap());
        assert!(!entities.is_acting(player).unwrap());
        assert!(!entities.is_tickable(player).unwrap());
        assert!(entities.is_acting(clock).unwrap());
        assert!(entities.is_tickable(clock).unwrap());
        assert!(!entities.is_avatar(clock).unwrap());
    }
}
