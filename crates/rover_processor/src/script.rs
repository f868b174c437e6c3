//! Per-entity scripts.
//!
//! Scripts are compiled elsewhere and handed over as trait objects. An
//! entity opts in through a [`ScriptRef`] component naming a script that
//! was registered in the [`ScriptRegistry`].
//!
//! When clones are updated by a parallel processor, `update` must only touch
//! the view it is given.

use std::collections::HashMap;
use std::sync::Arc;

use rover_component::{DataManager, Entity, EntityView, ScriptRef, StringId};
use tracing::{debug, warn};

use crate::error::ProcessorError;

/// Per-entity update logic.
pub trait Script: Send + Sync {
    /// Advance `view` by `dt` seconds.
    fn update(&self, view: &mut EntityView<'_>, dt: f32);
}

impl<F> Script for F
where
    F: Fn(&mut EntityView<'_>, f32) + Send + Sync,
{
    fn update(&self, view: &mut EntityView<'_>, dt: f32) {
        self(view, dt);
    }
}

/// Registered scripts, keyed by name.
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: HashMap<StringId, Arc<dyn Script>>,
}

impl std::fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.scripts.keys().map(ToString::to_string))
            .finish()
    }
}

impl ScriptRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `script` as `name`, replacing any earlier script of that name.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::ScriptName`] if `name` hashes to an id
    /// owned by another string; no script is replaced.
    pub fn register(
        &mut self,
        name: &str,
        script: impl Script + 'static,
    ) -> Result<StringId, ProcessorError> {
        let id = StringId::new(name)?;
        if self.scripts.insert(id, Arc::new(script)).is_some() {
            warn!(script = name, "script replaced");
        } else {
            debug!(script = name, "script registered");
        }
        Ok(id)
    }

    #[must_use]
    pub fn get(&self, id: StringId) -> Option<Arc<dyn Script>> {
        self.scripts.get(&id).cloned()
    }

    /// The script linked to `entity` through its [`ScriptRef`], or `None`
    /// if the entity has no [`ScriptRef`] or it names no script.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::UnknownScript`] if the named script was
    /// never registered.
    pub fn for_entity(
        &self,
        data: &DataManager,
        entity: Entity,
    ) -> Result<Option<(StringId, Arc<dyn Script>)>, ProcessorError> {
        let Some(script_ref) = data.get::<ScriptRef>(entity) else {
            return Ok(None);
        };
        let id = script_ref.script;
        if id == StringId::NONE {
            return Ok(None);
        }
        match self.get(id) {
            Some(script) => Ok(Some((id, script))),
            None => Err(ProcessorError::UnknownScript(id)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rover_component::{ComponentRegistry, Name};

    use super::*;

    fn rename(view: &mut EntityView<'_>, _dt: f32) {
        if let Some(name) = view.get_mut::<Name>() {
            *name = Name::new("renamed");
        }
    }

    fn mark_default(view: &mut EntityView<'_>, _dt: f32) {
        if let Some(name) = view.get_mut::<Name>() {
            *name = Name::default();
        }
    }

    #[test]
    fn test_function_scripts_and_lookup() {
        let mut scripts = ScriptRegistry::new();
        let id = scripts.register("script_test_rename", rename).unwrap();
        assert_eq!(scripts.len(), 1);

        let registry = ComponentRegistry::builder().with_builtins().unwrap().build();
        let mut dm = DataManager::new(registry, 4);
        let e = dm.create_entity(None).unwrap();
        dm.add(e, Name::new("before")).unwrap();
        assert!(scripts.for_entity(&dm, e).unwrap().is_none());

        dm.add(e, ScriptRef::new("script_test_rename").unwrap()).unwrap();
        let (found, script) = scripts.for_entity(&dm, e).unwrap().unwrap();
        assert_eq!(found, id);

        let mut views = dm.clone_views(e.id, 0..1).unwrap();
        script.update(&mut views[0], 0.1);
        drop(views);
        assert_eq!(dm.get::<Name>(e).unwrap().as_str(), "renamed");
    }

    #[test]
    fn test_unregistered_script_ref_is_an_error() {
        let scripts = ScriptRegistry::new();
        let registry = ComponentRegistry::builder().with_builtins().unwrap().build();
        let mut dm = DataManager::new(registry, 4);
        let e = dm.create_entity(None).unwrap();
        dm.add(e, ScriptRef::default()).unwrap();
        assert!(scripts.for_entity(&dm, e).unwrap().is_none());

        *dm.get_mut::<ScriptRef>(e).unwrap() = ScriptRef::new("script_test_missing").unwrap();
        assert!(matches!(
            scripts.for_entity(&dm, e),
            Err(ProcessorError::UnknownScript(id)) if id == StringId::hash("script_test_missing")
        ));
    }

    #[test]
    fn test_colliding_script_name_is_rejected() {
        let mut scripts = ScriptRegistry::new();
        // "costarring" and "liquid" share an FNV-1a 32 hash.
        let first = scripts.register("costarring", rename).unwrap();
        assert!(matches!(
            scripts.register("liquid", mark_default),
            Err(ProcessorError::ScriptName(_))
        ));
        assert_eq!(scripts.len(), 1);
        assert!(scripts.get(first).is_some());
    }
}
