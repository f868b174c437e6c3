//! Per-entity mutable views.
//!
//! An [`EntityView`] bundles mutable borrows of every component slot owned
//! by one entity (or one clone). Views produced together by
//! [`DataManager::clone_views`](crate::DataManager::clone_views) never
//! overlap, so they can be handed to different worker threads.

use crate::component::{Component, ComponentId};
use crate::entity::Entity;

#[derive(Debug)]
struct ViewSlot<'a> {
    component: ComponentId,
    bytes: &'a mut [u8],
    aux: &'a mut Vec<u8>,
}

/// Mutable access to the components of a single entity.
#[derive(Debug)]
pub struct EntityView<'a> {
    entity: Entity,
    slots: Vec<ViewSlot<'a>>,
}

impl<'a> EntityView<'a> {
    /// An empty view of `entity`.
    #[must_use]
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            slots: Vec::new(),
        }
    }

    /// Attach a component slot to the view.
    pub fn push(&mut self, component: ComponentId, bytes: &'a mut [u8], aux: &'a mut Vec<u8>) {
        self.slots.push(ViewSlot {
            component,
            bytes,
            aux,
        });
    }

    /// The entity this view belongs to.
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Component types reachable through this view.
    pub fn components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.slots.iter().map(|s| s.component)
    }

    /// Returns `true` if the entity holds `component`.
    #[must_use]
    pub fn has(&self, component: ComponentId) -> bool {
        self.slots.iter().any(|s| s.component == component)
    }

    fn slot(&self, component: ComponentId) -> Option<&ViewSlot<'a>> {
        self.slots.iter().find(|s| s.component == component)
    }

    fn slot_mut(&mut self, component: ComponentId) -> Option<&mut ViewSlot<'a>> {
        self.slots.iter_mut().find(|s| s.component == component)
    }

    /// Raw bytes of `component`.
    #[must_use]
    pub fn get_raw(&self, component: ComponentId) -> Option<&[u8]> {
        self.slot(component).map(|s| &*s.bytes)
    }

    /// Mutable raw bytes of `component`.
    #[must_use]
    pub fn get_raw_mut(&mut self, component: ComponentId) -> Option<&mut [u8]> {
        self.slot_mut(component).map(|s| &mut *s.bytes)
    }

    /// Typed access to component `T`.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<&T> {
        bytemuck::try_from_bytes(self.get_raw(T::component_id())?).ok()
    }

    /// Typed mutable access to component `T`.
    #[must_use]
    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        bytemuck::try_from_bytes_mut(self.get_raw_mut(T::component_id())?).ok()
    }

    /// Auxiliary payload of `component`.
    #[must_use]
    pub fn aux(&self, component: ComponentId) -> Option<&[u8]> {
        self.slot(component).map(|s| s.aux.as_slice())
    }

    /// Mutable auxiliary payload of `component`.
    #[must_use]
    pub fn aux_mut(&mut self, component: ComponentId) -> Option<&mut Vec<u8>> {
        self.slot_mut(component).map(|s| &mut *s.aux)
    }
}
