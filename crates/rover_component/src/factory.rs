//! Prototype replication.
//!
//! A [`Factory`] is bound to an entity holding a [`Prototype`] component.
//! Materialising it creates clones `1..=max_clones` of that entity, each
//! with a copy of every component of clone 0 except the `Prototype`
//! marker itself.

use std::ops::RangeInclusive;

use tracing::{debug, info};

use crate::component::{Component, ComponentId};
use crate::components::Prototype;
use crate::data_manager::DataManager;
use crate::entity::{Entity, EntityId};
use crate::error::DataError;

/// Creates and destroys the clones of one prototype entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factory {
    prototype: EntityId,
    max_clones: u32,
    materialized: bool,
}

impl Factory {
    /// Bind a factory to `prototype`.
    ///
    /// # Errors
    ///
    /// - [`DataError::EntityNotFound`] if the entity is not live.
    /// - [`DataError::ComponentNotFound`] if it has no `Prototype`.
    /// - [`DataError::TooManyClones`] if `max_clones` is above the range
    ///   declared for the `Prototype` attribute.
    pub fn new(data: &DataManager, prototype: EntityId) -> Result<Self, DataError> {
        let entity = Entity::new(prototype);
        if !data.is_alive(prototype) {
            return Err(DataError::EntityNotFound(entity));
        }
        let marker = data
            .get::<Prototype>(entity)
            .ok_or_else(|| DataError::ComponentNotFound {
                entity,
                component: Prototype::type_name().to_string(),
            })?;
        let limit = data
            .registry()
            .get(Prototype::component_id())
            .and_then(|info| info.description.find("maxClones"))
            .and_then(|attribute| attribute.max);
        if let Some(max) = limit {
            if f64::from(marker.max_clones) > max {
                return Err(DataError::TooManyClones {
                    entity: prototype,
                    requested: marker.max_clones,
                    max: max as u32,
                });
            }
        }
        Ok(Self {
            prototype,
            max_clones: marker.max_clones,
            materialized: false,
        })
    }

    /// The prototype entity (clone 0).
    #[must_use]
    pub fn prototype(&self) -> Entity {
        Entity::new(self.prototype)
    }

    /// Number of clones this factory creates.
    #[must_use]
    pub fn max_clones(&self) -> u32 {
        self.max_clones
    }

    /// The first clone.
    #[must_use]
    pub fn first_clone(&self) -> Entity {
        Entity::with_clone(self.prototype, 1)
    }

    /// Clone ids this factory owns.
    #[must_use]
    pub fn clones(&self) -> RangeInclusive<u32> {
        1..=self.max_clones
    }

    /// Returns `true` if `entity` is one of this factory's clones.
    #[must_use]
    pub fn is_clone(&self, entity: Entity) -> bool {
        entity.id == self.prototype && self.clones().contains(&entity.clone_id)
    }

    /// Returns `true` between `create_clones` and `destroy_clones`.
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    fn cloned_components(&self, data: &DataManager) -> Vec<ComponentId> {
        let mut components = data.components_of(self.prototype());
        components.retain(|&id| id != Prototype::component_id());
        components
    }

    /// Materialise every clone.
    ///
    /// Pool capacity is checked for all clones first, so a failure creates
    /// nothing. Calling this twice is a no-op.
    ///
    /// # Errors
    ///
    /// - [`DataError::EntityNotFound`] if the prototype was destroyed.
    /// - [`DataError::CapacityExceeded`] if a pool cannot hold every clone.
    pub fn create_clones(&mut self, data: &mut DataManager) -> Result<(), DataError> {
        if self.materialized {
            return Ok(());
        }
        let prototype = self.prototype();
        if !data.is_alive(self.prototype) {
            return Err(DataError::EntityNotFound(prototype));
        }

        let components = self.cloned_components(data);
        for &component in &components {
            if data.free_slots(component) < self.max_clones as usize {
                let info = data.registry().get(component);
                return Err(DataError::CapacityExceeded {
                    component: info.map_or_else(|| component.to_string(), |i| i.name().to_string()),
                    capacity: info.map_or(0, |i| i.description.max_instances),
                });
            }
        }

        let templates: Vec<(ComponentId, Vec<u8>, Vec<u8>)> = components
            .iter()
            .filter_map(|&component| {
                let bytes = data.get_component(prototype, component)?.to_vec();
                let aux = data.aux(prototype, component).unwrap_or_default().to_vec();
                Some((component, bytes, aux))
            })
            .collect();

        data.set_clone_count(self.prototype, self.max_clones);
        for clone_id in self.clones() {
            let entity = Entity::with_clone(self.prototype, clone_id);
            for (component, bytes, aux) in &templates {
                data.insert(entity, *component, bytes, aux.clone())?;
            }
        }
        self.materialized = true;
        info!(
            prototype = self.prototype,
            clones = self.max_clones,
            components = templates.len(),
            "clones created"
        );
        Ok(())
    }

    /// Remove every clone's components.
    ///
    /// # Errors
    ///
    /// Propagates removal failures; none are expected while the clones are
    /// materialised.
    pub fn destroy_clones(&mut self, data: &mut DataManager) -> Result<(), DataError> {
        if !self.materialized {
            return Ok(());
        }
        self.materialized = false;
        if !data.is_alive(self.prototype) {
            // Destroying the prototype already took the clones with it.
            return Ok(());
        }
        for clone_id in self.clones() {
            let entity = Entity::with_clone(self.prototype, clone_id);
            for component in data.components_of(entity) {
                data.remove_component(entity, component)?;
            }
        }
        data.set_clone_count(self.prototype, 0);
        debug!(prototype = self.prototype, "clones destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{MAX_CLONES, Name, PolygonCollider2D};
    use crate::registry::ComponentRegistry;

    fn manager() -> DataManager {
        DataManager::new(
            ComponentRegistry::builder().with_builtins().unwrap().build(),
            8,
        )
    }

    #[test]
    fn test_clones_copy_all_but_prototype() {
        let mut dm = manager();
        let e = dm.create_entity(None).unwrap();
        dm.add(e, Prototype { max_clones: 3 }).unwrap();
        dm.add(e, Name::new("drone")).unwrap();
        dm.add(e, PolygonCollider2D::default()).unwrap();
        PolygonCollider2D::set_points(&mut dm, e, &[[1.0, 2.0]]).unwrap();

        let mut factory = Factory::new(&dm, e.id).unwrap();
        factory.create_clones(&mut dm).unwrap();

        assert_eq!(dm.clone_count(e.id), 3);
        assert_eq!(factory.first_clone(), Entity::with_clone(e.id, 1));
        for clone_id in 1..=3 {
            let clone = Entity::with_clone(e.id, clone_id);
            assert!(factory.is_clone(clone));
            assert_eq!(dm.get::<Name>(clone).unwrap().as_str(), "drone");
            assert!(dm.get::<Prototype>(clone).is_none());
            assert_eq!(
                PolygonCollider2D::points(&dm, clone).unwrap(),
                vec![[1.0, 2.0]]
            );
        }
        assert!(!factory.is_clone(e));
        assert_eq!(dm.live_count(Name::component_id()), 4);
    }

    #[test]
    fn test_destroy_clones_keeps_prototype() {
        let mut dm = manager();
        let e = dm.create_entity(None).unwrap();
        dm.add(e, Prototype { max_clones: 2 }).unwrap();
        dm.add(e, Name::new("a")).unwrap();

        let mut factory = Factory::new(&dm, e.id).unwrap();
        factory.create_clones(&mut dm).unwrap();
        factory.create_clones(&mut dm).unwrap();
        assert_eq!(dm.live_count(Name::component_id()), 3);

        factory.destroy_clones(&mut dm).unwrap();
        assert_eq!(dm.live_count(Name::component_id()), 1);
        assert_eq!(dm.clone_count(e.id), 0);
        assert!(dm.get::<Name>(e).is_some());
        assert!(!factory.is_materialized());
    }

    #[test]
    fn test_capacity_failure_creates_nothing() {
        let mut dm = manager();
        let e = dm.create_entity(None).unwrap();
        dm.add(e, Prototype { max_clones: 1024 }).unwrap();
        dm.add(e, Name::new("swarm")).unwrap();

        let mut factory = Factory::new(&dm, e.id).unwrap();
        assert!(matches!(
            factory.create_clones(&mut dm),
            Err(DataError::CapacityExceeded { .. })
        ));
        assert_eq!(dm.live_count(Name::component_id()), 1);
        assert_eq!(dm.clone_count(e.id), 0);
    }

    #[test]
    fn test_clone_limit_is_enforced() {
        let mut dm = manager();
        let e = dm.create_entity(None).unwrap();
        dm.add(e, Prototype { max_clones: u32::MAX }).unwrap();
        assert!(matches!(
            Factory::new(&dm, e.id),
            Err(DataError::TooManyClones { requested: u32::MAX, max: MAX_CLONES, .. })
        ));

        dm.get_mut::<Prototype>(e).unwrap().max_clones = MAX_CLONES;
        let factory = Factory::new(&dm, e.id).unwrap();
        assert_eq!(factory.clones(), 1..=MAX_CLONES);
        assert!(factory.is_clone(Entity::with_clone(e.id, MAX_CLONES)));
        assert!(!factory.is_clone(Entity::with_clone(e.id, MAX_CLONES + 1)));
        assert!(!factory.is_clone(Entity::with_clone(e.id, u32::MAX)));

        dm.get_mut::<Prototype>(e).unwrap().max_clones = MAX_CLONES + 1;
        assert!(Factory::new(&dm, e.id).is_err());
    }

    #[test]
    fn test_zero_clones_is_empty() {
        let mut dm = manager();
        let e = dm.create_entity(None).unwrap();
        dm.add(e, Prototype { max_clones: 0 }).unwrap();
        dm.add(e, Name::new("solo")).unwrap();
        let mut factory = Factory::new(&dm, e.id).unwrap();
        assert!(factory.clones().is_empty());
        factory.create_clones(&mut dm).unwrap();
        assert_eq!(dm.live_count(Name::component_id()), 1);
    }

    #[test]
    fn test_factory_requires_prototype() {
        let mut dm = manager();
        let e = dm.create_entity(None).unwrap();
        assert!(matches!(
            Factory::new(&dm, e.id),
            Err(DataError::ComponentNotFound { .. })
        ));
        assert!(matches!(
            Factory::new(&dm, 5),
            Err(DataError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_destroying_prototype_takes_clones() {
        let mut dm = manager();
        let e = dm.create_entity(None).unwrap();
        dm.add(e, Prototype { max_clones: 2 }).unwrap();
        dm.add(e, Name::new("a")).unwrap();
        let mut factory = Factory::new(&dm, e.id).unwrap();
        factory.create_clones(&mut dm).unwrap();

        dm.destroy_entity(e).unwrap();
        assert_eq!(dm.live_count(Name::component_id()), 0);
        factory.destroy_clones(&mut dm).unwrap();
    }
}
