//! The authoritative store for entities and component instances.
//!
//! A [`DataManager`] owns one [`ComponentPool`] per registered component
//! type, the entity id allocator, the per-entity clone counts, and the
//! [`EventBus`] that announces every successful mutation. Failed
//! operations leave all of it unchanged.
//!
//! Slots move when other instances of the same type are removed, so the
//! manager hands out [`ComponentRef`]s instead of pointers. A reference
//! records the pool epoch it was issued at and refuses to resolve once the
//! pool has compacted.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::component::{Component, ComponentId};
use crate::entity::{Entity, EntityAllocator, EntityId};
use crate::error::{DataError, SerializeError};
use crate::event::{EventBus, EventKind};
use crate::pool::ComponentPool;
use crate::registry::ComponentRegistry;
use crate::serialize::{self, EntitySnapshot, Snapshot};
use crate::view::EntityView;

/// Default entity limit.
pub const DEFAULT_MAX_ENTITIES: u32 = 1024;

/// Epoch-checked reference to a component slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentRef {
    /// Component type.
    pub component: ComponentId,
    /// Owner at the time the reference was issued.
    pub entity: Entity,
    /// Slot index inside the pool.
    pub slot: u32,
    /// Pool epoch at issue time.
    pub epoch: u64,
}

/// Entity and component storage.
#[derive(Debug)]
pub struct DataManager {
    registry: Arc<ComponentRegistry>,
    entities: EntityAllocator,
    /// Indexed by registration order.
    pools: Vec<ComponentPool>,
    /// Number of clones (excluding clone 0) per base entity.
    clones: HashMap<EntityId, u32>,
    events: EventBus,
}

impl DataManager {
    /// Create an empty manager with one pool per registered type.
    #[must_use]
    pub fn new(registry: Arc<ComponentRegistry>, max_entities: u32) -> Self {
        let pools = registry
            .iter()
            .map(|info| {
                ComponentPool::new(
                    info.id,
                    info.name(),
                    info.size,
                    info.description.max_instances,
                )
            })
            .collect();
        Self {
            registry,
            entities: EntityAllocator::new(max_entities),
            pools,
            clones: HashMap::new(),
            events: EventBus::new(),
        }
    }

    /// The component catalog this manager was built from.
    #[must_use]
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// The lifecycle event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Mutable access to the bus, for subscribing.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    fn pool(&self, component: ComponentId) -> Option<&ComponentPool> {
        self.registry
            .index_of(component)
            .map(|index| &self.pools[index])
    }

    fn pool_mut(&mut self, component: ComponentId) -> Option<&mut ComponentPool> {
        self.registry
            .index_of(component)
            .map(|index| &mut self.pools[index])
    }

    fn component_name(&self, component: ComponentId) -> String {
        self.registry
            .get(component)
            .map_or_else(|| component.to_string(), |info| info.name().to_string())
    }

    // ---- entities ------------------------------------------------------

    /// Create an entity, with the lowest free id when `requested` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::EntityIdInUse`], [`DataError::EntityIdOutOfRange`]
    /// or [`DataError::EntityLimitReached`].
    pub fn create_entity(&mut self, requested: Option<EntityId>) -> Result<Entity, DataError> {
        let id = self.entities.reserve(requested).inspect_err(|e| {
            warn!(error = %e, "create entity rejected");
        })?;
        let entity = Entity::new(id);
        debug!(%entity, "entity created");
        self.events.emit(EventKind::EntityCreated { entity });
        Ok(entity)
    }

    /// Destroy `entity.id` with every component of every clone.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::EntityNotFound`] if the id is not live.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), DataError> {
        if !self.entities.is_live(entity.id) {
            warn!(%entity, "destroy of missing entity");
            return Err(DataError::EntityNotFound(entity));
        }
        self.destroy_id(entity.id);
        Ok(())
    }

    fn destroy_id(&mut self, id: EntityId) {
        let mut removed = Vec::new();
        for pool in &mut self.pools {
            let owners: Vec<Entity> = pool
                .owners()
                .iter()
                .copied()
                .filter(|owner| owner.id == id)
                .collect();
            for owner in owners {
                pool.remove(owner);
                removed.push((owner, pool.id()));
            }
        }
        self.entities.release(id);
        self.clones.remove(&id);

        for (entity, component) in removed {
            self.events
                .emit(EventKind::ComponentDestroyed { entity, component });
        }
        let entity = Entity::new(id);
        debug!(%entity, "entity destroyed");
        self.events.emit(EventKind::EntityDestroyed { entity });
    }

    /// Returns `true` if base id `id` is live.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.is_live(id)
    }

    /// Returns `true` if `entity`'s base is live and its clone id exists.
    #[must_use]
    pub fn exists(&self, entity: Entity) -> bool {
        self.is_alive(entity.id) && entity.clone_id <= self.clone_count(entity.id)
    }

    /// Live base ids in ascending order.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        self.entities.iter().collect()
    }

    /// Number of live base entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of clones of `id`, excluding clone 0.
    #[must_use]
    pub fn clone_count(&self, id: EntityId) -> u32 {
        self.clones.get(&id).copied().unwrap_or(0)
    }

    pub(crate) fn set_clone_count(&mut self, id: EntityId, count: u32) {
        if count == 0 {
            self.clones.remove(&id);
        } else {
            self.clones.insert(id, count);
        }
    }

    // ---- components ----------------------------------------------------

    /// Bind a default-initialised `component` to `entity`.
    ///
    /// # Errors
    ///
    /// - [`DataError::EntityNotFound`] if `entity` does not exist.
    /// - [`DataError::UnknownComponent`] if `component` is not registered.
    /// - [`DataError::DuplicateComponent`] or [`DataError::CapacityExceeded`].
    pub fn add_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<ComponentRef, DataError> {
        let info = self
            .registry
            .get(component)
            .ok_or(DataError::UnknownComponent(component))?;
        let bytes = info.default_bytes.clone();
        self.insert(entity, component, &bytes, Vec::new())
    }

    /// Bind `component` to `entity`, initialised from `bytes`.
    ///
    /// # Errors
    ///
    /// As [`DataManager::add_component`], plus [`DataError::SizeMismatch`].
    pub fn add_component_bytes(
        &mut self,
        entity: Entity,
        component: ComponentId,
        bytes: &[u8],
    ) -> Result<ComponentRef, DataError> {
        self.insert(entity, component, bytes, Vec::new())
    }

    /// Bind `value` to `entity`.
    ///
    /// # Errors
    ///
    /// As [`DataManager::add_component`].
    pub fn add<T: Component>(&mut self, entity: Entity, value: T) -> Result<ComponentRef, DataError> {
        self.insert(entity, T::component_id(), bytemuck::bytes_of(&value), Vec::new())
    }

    pub(crate) fn insert(
        &mut self,
        entity: Entity,
        component: ComponentId,
        bytes: &[u8],
        aux: Vec<u8>,
    ) -> Result<ComponentRef, DataError> {
        if !self.exists(entity) {
            return Err(DataError::EntityNotFound(entity));
        }
        let pool = self
            .pool_mut(component)
            .ok_or(DataError::UnknownComponent(component))?;
        let slot = pool.insert(entity, bytes, aux).inspect_err(|e| {
            warn!(%entity, error = %e, "add component rejected");
        })?;
        let reference = ComponentRef {
            component,
            entity,
            slot,
            epoch: pool.epoch(),
        };
        self.events.emit(EventKind::ComponentCreated {
            entity,
            component,
            reference,
        });
        Ok(reference)
    }

    /// Raw bytes of `entity`'s `component`, `None` when absent.
    #[must_use]
    pub fn get_component(&self, entity: Entity, component: ComponentId) -> Option<&[u8]> {
        self.pool(component)?.get(entity)
    }

    /// Mutable raw bytes of `entity`'s `component`, `None` when absent.
    #[must_use]
    pub fn get_component_mut(&mut self, entity: Entity, component: ComponentId) -> Option<&mut [u8]> {
        self.pool_mut(component)?.get_mut(entity)
    }

    /// Typed lookup.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        bytemuck::try_from_bytes(self.get_component(entity, T::component_id())?).ok()
    }

    /// Typed mutable lookup.
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        bytemuck::try_from_bytes_mut(self.get_component_mut(entity, T::component_id())?).ok()
    }

    /// Returns `true` if `entity` holds `component`.
    #[must_use]
    pub fn has_component(&self, entity: Entity, component: ComponentId) -> bool {
        self.pool(component).is_some_and(|pool| pool.contains(entity))
    }

    /// Auxiliary payload of a variable-length component.
    #[must_use]
    pub fn aux(&self, entity: Entity, component: ComponentId) -> Option<&[u8]> {
        self.pool(component)?.aux(entity)
    }

    /// Mutable auxiliary payload. `None` for fixed-size component types.
    #[must_use]
    pub fn aux_mut(&mut self, entity: Entity, component: ComponentId) -> Option<&mut Vec<u8>> {
        if !self.registry.get(component)?.description.variable_length {
            return None;
        }
        self.pool_mut(component)?.aux_mut(entity)
    }

    /// Unbind `component` from `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownComponent`] or
    /// [`DataError::ComponentNotFound`].
    pub fn remove_component(&mut self, entity: Entity, component: ComponentId) -> Result<(), DataError> {
        let pool = self
            .pool_mut(component)
            .ok_or(DataError::UnknownComponent(component))?;
        if !pool.remove(entity) {
            let name = self.component_name(component);
            warn!(%entity, component = %name, "remove of missing component");
            return Err(DataError::ComponentNotFound {
                entity,
                component: name,
            });
        }
        self.events
            .emit(EventKind::ComponentDestroyed { entity, component });
        Ok(())
    }

    /// Typed [`DataManager::remove_component`].
    ///
    /// # Errors
    ///
    /// As [`DataManager::remove_component`].
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<(), DataError> {
        self.remove_component(entity, T::component_id())
    }

    /// Bytes behind `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::StaleReference`] if the pool compacted since the
    /// reference was issued, or [`DataError::UnknownComponent`].
    pub fn resolve(&self, reference: &ComponentRef) -> Result<&[u8], DataError> {
        let pool = self
            .pool(reference.component)
            .ok_or(DataError::UnknownComponent(reference.component))?;
        let owner = pool.owners().get(reference.slot as usize);
        if pool.epoch() != reference.epoch || owner != Some(&reference.entity) {
            return Err(self.stale(reference));
        }
        pool.slot(reference.slot)
            .ok_or_else(|| self.stale(reference))
    }

    /// Mutable bytes behind `reference`.
    ///
    /// # Errors
    ///
    /// As [`DataManager::resolve`].
    pub fn resolve_mut(&mut self, reference: &ComponentRef) -> Result<&mut [u8], DataError> {
        self.resolve(reference)?;
        let stale = self.stale(reference);
        self.pool_mut(reference.component)
            .and_then(|pool| pool.slot_mut(reference.slot))
            .ok_or(stale)
    }

    fn stale(&self, reference: &ComponentRef) -> DataError {
        DataError::StaleReference {
            component: self.component_name(reference.component),
            slot: reference.slot,
        }
    }

    // ---- enumeration ---------------------------------------------------

    /// `(owner, bytes)` for every instance of `component`, in slot order.
    pub fn iter_component(&self, component: ComponentId) -> impl Iterator<Item = (Entity, &[u8])> + '_ {
        self.pool(component).into_iter().flat_map(ComponentPool::iter)
    }

    /// `(owner, &T)` for every instance of `T`, in slot order.
    pub fn iter<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> + '_ {
        self.iter_component(T::component_id())
            .filter_map(|(entity, bytes)| Some((entity, bytemuck::try_from_bytes(bytes).ok()?)))
    }

    /// Component types held by `entity`, in registration order.
    #[must_use]
    pub fn components_of(&self, entity: Entity) -> Vec<ComponentId> {
        self.pools
            .iter()
            .filter(|pool| pool.contains(entity))
            .map(ComponentPool::id)
            .collect()
    }

    /// Number of live instances of `component`.
    #[must_use]
    pub fn live_count(&self, component: ComponentId) -> usize {
        self.pool(component).map_or(0, ComponentPool::len)
    }

    /// Remaining room in `component`'s pool.
    #[must_use]
    pub fn free_slots(&self, component: ComponentId) -> usize {
        self.pool(component)
            .map_or(0, |pool| pool.capacity() as usize - pool.len())
    }

    /// Disjoint mutable views of clones `clones` of entity `id`.
    ///
    /// `views[i]` belongs to clone `clones.start + i`.
    ///
    /// # Errors
    ///
    /// - [`DataError::EntityNotFound`] if `id` is not live.
    /// - [`DataError::CloneOutOfRange`] if the range passes the last clone.
    pub fn clone_views(
        &mut self,
        id: EntityId,
        clones: Range<u32>,
    ) -> Result<Vec<EntityView<'_>>, DataError> {
        if !self.is_alive(id) {
            return Err(DataError::EntityNotFound(Entity::new(id)));
        }
        let available = self.clone_count(id);
        if u64::from(clones.end) > u64::from(available) + 1 {
            return Err(DataError::CloneOutOfRange {
                entity: id,
                requested: clones.end,
                available,
            });
        }

        let mut views: Vec<EntityView<'_>> = clones
            .clone()
            .map(|clone_id| EntityView::new(Entity::with_clone(id, clone_id)))
            .collect();
        for pool in &mut self.pools {
            let component = pool.id();
            for (owner, bytes, aux) in pool.slots_mut() {
                if owner.id == id && clones.contains(&owner.clone_id) {
                    views[(owner.clone_id - clones.start) as usize].push(component, bytes, aux);
                }
            }
        }
        Ok(views)
    }

    // ---- persistence ---------------------------------------------------

    /// Capture every base entity and its components.
    ///
    /// Clones are not captured; factories rebuild them.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::Custom`] if a custom codec cannot encode
    /// its payload.
    pub fn snapshot(&self) -> Result<Snapshot, SerializeError> {
        let entities = self
            .entities
            .iter()
            .map(|id| {
                let entity = Entity::new(id);
                let components = self
                    .registry
                    .iter()
                    .zip(&self.pools)
                    .filter_map(|(info, pool)| {
                        let bytes = pool.get(entity)?;
                        let aux = pool.aux(entity).unwrap_or_default();
                        Some(serialize::read_component(info, bytes, aux))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, SerializeError>(EntitySnapshot { id, components })
            })
            .collect::<Result<Vec<_>, SerializeError>>()?;
        Ok(Snapshot { entities })
    }

    /// Encode [`DataManager::snapshot`] as MessagePack.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::Encode`] if encoding fails, or any error
    /// from [`DataManager::snapshot`].
    pub fn save(&self) -> Result<Vec<u8>, SerializeError> {
        self.snapshot()?.to_bytes()
    }

    /// Replace the manager's contents with `snapshot`.
    ///
    /// Every component is decoded before anything is cleared, so a bad
    /// snapshot leaves the manager untouched.
    ///
    /// # Errors
    ///
    /// - [`SerializeError::UnknownComponent`] for unregistered types.
    /// - Any attribute decoding error.
    /// - [`SerializeError::Data`] if the snapshot does not fit the pools or
    ///   the entity limit.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SerializeError> {
        let mut decoded = Vec::with_capacity(snapshot.entities.len());
        let mut per_type = vec![0u32; self.pools.len()];
        let mut seen = HashSet::new();
        for entity in &snapshot.entities {
            if !seen.insert(entity.id) {
                return Err(DataError::EntityIdInUse(entity.id).into());
            }
            if entity.id >= self.entities.max() {
                return Err(DataError::EntityIdOutOfRange {
                    id: entity.id,
                    max: self.entities.max(),
                }
                .into());
            }
            let mut components = Vec::with_capacity(entity.components.len());
            for component in &entity.components {
                let info = self
                    .registry
                    .find_by_name(&component.name)
                    .ok_or_else(|| SerializeError::UnknownComponent(component.name.clone()))?;
                if components.iter().any(|(id, _, _)| *id == info.id) {
                    return Err(DataError::DuplicateComponent {
                        entity: Entity::new(entity.id),
                        component: component.name.clone(),
                    }
                    .into());
                }
                per_type[info.index] += 1;
                let (bytes, aux) = serialize::write_component(info, component)?;
                components.push((info.id, bytes, aux));
            }
            decoded.push((entity.id, components));
        }
        for (info, count) in self.registry.iter().zip(&per_type) {
            if *count > info.description.max_instances {
                return Err(DataError::CapacityExceeded {
                    component: info.name().to_string(),
                    capacity: info.description.max_instances,
                }
                .into());
            }
        }

        self.clear();
        for (id, components) in decoded {
            let entity = self.create_entity(Some(id))?;
            for (component, bytes, aux) in components {
                self.insert(entity, component, &bytes, aux)?;
            }
        }
        info!(entities = self.entity_count(), "snapshot restored");
        Ok(())
    }

    /// Decode MessagePack produced by [`DataManager::save`] and restore it.
    ///
    /// # Errors
    ///
    /// As [`DataManager::restore`], plus [`SerializeError::Decode`].
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), SerializeError> {
        let snapshot = Snapshot::from_bytes(bytes)?;
        self.restore(&snapshot)
    }

    /// Destroy every entity, publishing the usual events.
    pub fn clear(&mut self) {
        let ids = self.entities();
        for id in ids {
            self.destroy_id(id);
        }
        for pool in &mut self.pools {
            pool.clear();
        }
        self.entities.clear();
        self.clones.clear();
    }
}
