//! Entity handle and id allocation.
//!
//! An [`Entity`] is a plain `(id, clone_id)` pair. It owns nothing; every
//! lookup goes through the [`DataManager`]. Clone id 0 is the entity
//! itself, clone ids above 0 address replicas of a prototype.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::data_manager::DataManager;
use crate::error::DataError;

/// Dense, recyclable entity id.
pub type EntityId = u32;

/// The "no entity" sentinel.
pub const NO_ENTITY: EntityId = EntityId::MAX;

/// A lookup key into the [`DataManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    /// Base entity id.
    pub id: EntityId,
    /// Clone index, 0 for the entity itself.
    pub clone_id: u32,
}

impl Entity {
    /// The invalid entity.
    pub const NONE: Entity = Entity {
        id: NO_ENTITY,
        clone_id: 0,
    };

    /// The base instance of entity `id`.
    #[must_use]
    pub const fn new(id: EntityId) -> Self {
        Self { id, clone_id: 0 }
    }

    /// Clone `clone_id` of entity `id`.
    #[must_use]
    pub const fn with_clone(id: EntityId, clone_id: u32) -> Self {
        Self { id, clone_id }
    }

    /// The base instance this handle was cloned from.
    #[must_use]
    pub const fn prototype(self) -> Self {
        Self::new(self.id)
    }

    /// Returns `true` for clone ids above 0.
    #[must_use]
    pub const fn is_clone(self) -> bool {
        self.clone_id != 0
    }

    /// Returns `true` unless this is [`Entity::NONE`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.id != NO_ENTITY
    }

    /// Shorthand for [`DataManager::get`].
    #[must_use]
    pub fn get<T: Component>(self, data: &DataManager) -> Option<&T> {
        data.get::<T>(self)
    }

    /// Shorthand for [`DataManager::get_mut`].
    #[must_use]
    pub fn get_mut<T: Component>(self, data: &mut DataManager) -> Option<&mut T> {
        data.get_mut::<T>(self)
    }
}

impl From<EntityId> for Entity {
    fn from(id: EntityId) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.clone_id == 0 {
            write!(f, "Entity({})", self.id)
        } else {
            write!(f, "Entity({}#{})", self.id, self.clone_id)
        }
    }
}

/// Hands out entity ids, lowest free id first.
#[derive(Debug)]
pub struct EntityAllocator {
    max: u32,
    live: BTreeSet<EntityId>,
}

impl EntityAllocator {
    /// Create an allocator for ids `0..max`.
    #[must_use]
    pub fn new(max: u32) -> Self {
        Self {
            max,
            live: BTreeSet::new(),
        }
    }

    /// Reserve `requested`, or the lowest free id when `None`.
    ///
    /// # Errors
    ///
    /// - [`DataError::EntityIdOutOfRange`] if `requested >= max`.
    /// - [`DataError::EntityIdInUse`] if `requested` is live.
    /// - [`DataError::EntityLimitReached`] if every id is live.
    pub fn reserve(&mut self, requested: Option<EntityId>) -> Result<EntityId, DataError> {
        let id = match requested {
            Some(id) if id >= self.max => {
                return Err(DataError::EntityIdOutOfRange { id, max: self.max });
            }
            Some(id) if self.live.contains(&id) => return Err(DataError::EntityIdInUse(id)),
            Some(id) => id,
            None => self.lowest_free()?,
        };
        self.live.insert(id);
        Ok(id)
    }

    fn lowest_free(&self) -> Result<EntityId, DataError> {
        // Live ids are sorted, so the first gap is the lowest free id.
        let mut candidate = 0;
        for &id in &self.live {
            if id != candidate {
                break;
            }
            candidate += 1;
        }
        if candidate >= self.max {
            Err(DataError::EntityLimitReached { max: self.max })
        } else {
            Ok(candidate)
        }
    }

    /// Free `id`. Returns `false` if it was not live.
    pub fn release(&mut self, id: EntityId) -> bool {
        self.live.remove(&id)
    }

    /// Returns `true` if `id` is reserved.
    #[must_use]
    pub fn is_live(&self, id: EntityId) -> bool {
        self.live.contains(&id)
    }

    /// Live ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.live.iter().copied()
    }

    /// Number of live ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns `true` if no id is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// The configured entity limit.
    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Free every id.
    pub fn clear(&mut self) {
        self.live.clear();
    }
}
