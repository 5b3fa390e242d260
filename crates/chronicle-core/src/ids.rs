//! Global id allocator.
//!
//! Hands out strictly increasing integers from the persisted sequence. The
//! same sequence backs entity, action, event, edge, tag and type ids, so an
//! integer never names two things.

use std::sync::Arc;

use chronicle_db::{Store, ids};
use chronicle_types::{ActionId, EntityId};

use crate::error::CoreError;

/// Allocator over the store's global id sequence.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    store: Arc<Store>,
}

impl IdAllocator {
    /// Create an allocator bound to a store.
    pub const fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Allocate the next raw id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the sequence cannot be advanced.
    pub fn next(&self) -> Result<i64, CoreError> {
        Ok(self.store.with_conn(ids::next)?)
    }

    /// Allocate an id for a new entity.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the sequence cannot be advanced.
    pub fn next_entity(&self) -> Result<EntityId, CoreError> {
        self.next().map(EntityId)
    }

    /// Allocate an id for a new action.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the sequence cannot be advanced.
    pub fn next_action(&self) -> Result<ActionId, CoreError> {
        self.next().map(ActionId)
    }

    /// The most recently allocated id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the sequence cannot be read.
    pub fn current(&self) -> Result<i64, CoreError> {
        Ok(self.store.with_conn(ids::current)?)
    }
}
