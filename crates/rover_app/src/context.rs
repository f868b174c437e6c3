//! The simulation context.
//!
//! [`SimContext`] owns every subsystem of one simulated world and is passed
//! explicitly to whatever needs it. Several contexts can coexist in one
//! process; only the string table is shared.

use std::sync::Arc;

use anyhow::Result;
use rover_component::{
    Component, ComponentRegistry, DataManager, Entity, Event, EventKind, Factory, Prototype,
    ScriptRef,
};
use rover_math::Transform;
use rover_processor::{
    DeviceProvider, EmulatedProvider, NoDevice, ProcessorError, ProcessorManager, ProcessorState,
    Script, ScriptRegistry,
};
use tracing::{debug, info};

use crate::config::SimConfig;

/// One simulated world.
#[derive(Debug)]
pub struct SimContext {
    pub data: DataManager,
    pub processors: ProcessorManager,
    pub scripts: ScriptRegistry,
    factories: Vec<Factory>,
}

/// Component types known to the simulator, in registration order.
pub fn component_registry() -> Result<Arc<ComponentRegistry>> {
    Ok(ComponentRegistry::builder()
        .with_builtins()?
        .register::<Transform>()?
        .build())
}

impl SimContext {
    /// Build an empty world from `config`.
    ///
    /// # Errors
    ///
    /// Fails if the component registry cannot be built.
    pub fn new(config: &SimConfig) -> Result<Self> {
        let provider: Box<dyn DeviceProvider> = if config.emulate_device {
            Box::new(EmulatedProvider {
                workers: config.processors.cpu_workers,
            })
        } else {
            Box::new(NoDevice)
        };
        let registry = component_registry()?;
        info!(components = registry.len(), "component registry built");
        Ok(Self {
            data: DataManager::new(registry, config.max_entities),
            processors: ProcessorManager::new(config.processors, provider, config.processor),
            scripts: ScriptRegistry::new(),
            factories: Vec::new(),
        })
    }

    /// Mark `entity` as a prototype whose clones are created at start.
    ///
    /// # Errors
    ///
    /// Fails if the entity has no [`Prototype`] component.
    pub fn add_factory(&mut self, entity: Entity) -> Result<()> {
        let factory = Factory::new(&self.data, entity.id)?;
        debug!(prototype = entity.id, clones = factory.max_clones(), "factory added");
        self.factories.push(factory);
        Ok(())
    }

    #[must_use]
    pub fn factories(&self) -> &[Factory] {
        &self.factories
    }

    /// Publish a simulation event, then let the processors react to it.
    fn publish(&mut self, kind: EventKind) -> Result<(), ProcessorError> {
        let mut event = Event::new(kind);
        self.data.events_mut().publish(&mut event);
        self.processors.on_event(event.kind())
    }

    /// Create every factory's clones and start the processor.
    ///
    /// # Errors
    ///
    /// Fails if clones do not fit their pools or no processor can start.
    pub fn start(&mut self) -> Result<()> {
        for factory in &mut self.factories {
            factory.create_clones(&mut self.data)?;
        }
        self.publish(EventKind::SimulationStart)?;
        info!(processor = %self.processors.processor().kind(), "simulation started");
        Ok(())
    }

    /// # Errors
    ///
    /// Fails unless running.
    pub fn pause(&mut self) -> Result<()> {
        Ok(self.publish(EventKind::SimulationPause)?)
    }

    /// # Errors
    ///
    /// Fails unless paused.
    pub fn resume(&mut self) -> Result<()> {
        Ok(self.publish(EventKind::SimulationContinue)?)
    }

    /// Stop the processor and destroy every clone.
    ///
    /// # Errors
    ///
    /// Fails unless running or paused.
    pub fn stop(&mut self) -> Result<()> {
        self.publish(EventKind::SimulationStop)?;
        for factory in &mut self.factories {
            factory.destroy_clones(&mut self.data)?;
        }
        info!("simulation stopped");
        Ok(())
    }

    /// Advance exactly one tick and leave the simulation paused.
    ///
    /// # Errors
    ///
    /// Fails if the processor cannot start or a script target vanished.
    pub fn step(&mut self, dt: f32) -> Result<()> {
        if self.processors.processor().state() != ProcessorState::Paused {
            for factory in &mut self.factories {
                factory.create_clones(&mut self.data)?;
            }
        }
        self.publish(EventKind::SimulationStep)?;
        self.processors.processor_mut().resume()?;
        let result = self.tick(dt);
        self.processors.processor_mut().pause()?;
        result
    }

    /// Entities to update this tick: each scripted base entity, or the
    /// clones of a materialised prototype in its place.
    fn targets(&self) -> Result<Vec<(Entity, u32, Arc<dyn Script>)>, ProcessorError> {
        let mut targets = Vec::new();
        for (entity, _) in self.data.iter::<ScriptRef>() {
            if entity.is_clone() {
                continue;
            }
            let Some((_, script)) = self.scripts.for_entity(&self.data, entity)? else {
                continue;
            };
            let factory = self
                .factories
                .iter()
                .find(|f| f.prototype() == entity && f.is_materialized());
            match factory {
                Some(f) => targets.push((f.first_clone(), f.max_clones(), script)),
                // Prototypes without clones are only templates.
                None if self.data.has_component(entity, Prototype::component_id()) => {}
                None => targets.push((entity, 1, script)),
            }
        }
        Ok(targets)
    }

    /// Run every script once over its targets.
    ///
    /// # Errors
    ///
    /// Fails unless the processor is running, or if a [`ScriptRef`] names
    /// a script that was never registered.
    pub fn tick(&mut self, dt: f32) -> Result<()> {
        let processor = self.processors.processor();
        processor.ensure_running()?;
        let targets = self.targets()?;
        for (entity, count, script) in targets {
            processor.run_clones(&mut self.data, script.as_ref(), entity, dt, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rover_component::{Name, StringId};

    use super::*;

    #[test]
    fn test_tick_reports_unregistered_script() {
        let mut context = SimContext::new(&SimConfig::default()).unwrap();
        let e = context.data.create_entity(None).unwrap();
        context.data.add(e, Name::new("stray")).unwrap();
        context
            .data
            .add(e, ScriptRef::new("context_test_unregistered").unwrap())
            .unwrap();
        context.start().unwrap();

        let err = context.tick(0.1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProcessorError>(),
            Some(ProcessorError::UnknownScript(id))
                if *id == StringId::hash("context_test_unregistered")
        ));
        context.stop().unwrap();
    }
}
