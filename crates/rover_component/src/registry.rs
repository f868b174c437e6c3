//! The component type catalog.
//!
//! Registration is an explicit, ordered list of `register::<T>()` calls on
//! a [`ComponentRegistryBuilder`]. Each call checks the type's layout
//! against its description once; the resulting [`ComponentRegistry`] is
//! immutable and shared behind an `Arc`. Registration order fixes the order
//! of pools and of [`DataManager::components_of`](crate::DataManager::components_of).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::attribute::AttributeType;
use crate::component::{Component, ComponentDescription, ComponentId};
use crate::components::{Name, PolygonCollider2D, Prototype, ScriptRef};
use crate::error::RegistryError;
use crate::pool::SLOT_ALIGN;
use crate::string_id::StringRegistry;

/// Everything the storage layer knows about one component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Type id.
    pub id: ComponentId,
    /// Position in registration order.
    pub index: usize,
    /// Reflection metadata.
    pub description: ComponentDescription,
    /// `size_of::<T>()`.
    pub size: usize,
    /// `align_of::<T>()`.
    pub align: usize,
    /// Bytes of `T::default()`.
    pub default_bytes: Vec<u8>,
}

impl ComponentInfo {
    /// The registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.description.name
    }
}

/// Collects component types in registration order.
#[derive(Debug, Default)]
pub struct ComponentRegistryBuilder {
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistryBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the components every world carries: `Name`, `Prototype`,
    /// `ScriptRef` and `PolygonCollider2D`.
    ///
    /// # Errors
    ///
    /// Fails if any of them is already registered.
    pub fn with_builtins(self) -> Result<Self, RegistryError> {
        self.register::<Name>()?
            .register::<Prototype>()?
            .register::<ScriptRef>()?
            .register::<PolygonCollider2D>()
    }

    /// Add component type `T`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Duplicate`] if `T` (or a type with the same name)
    ///   is already registered.
    /// - [`RegistryError::NameCollision`] if the name's StringId is owned by
    ///   a different string.
    /// - [`RegistryError::Alignment`] if `T` needs more than 16-byte
    ///   alignment.
    /// - [`RegistryError::InvalidAttribute`] if an attribute does not fit
    ///   the layout of `T`.
    pub fn register<T: Component>(mut self) -> Result<Self, RegistryError> {
        let name = T::type_name();
        let id = T::component_id();
        if self.infos.iter().any(|info| info.id == id) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        let align = std::mem::align_of::<T>();
        if align > SLOT_ALIGN {
            return Err(RegistryError::Alignment {
                component: name.to_string(),
                align,
            });
        }

        let description = T::describe();
        let size = std::mem::size_of::<T>();
        check_attributes(name, &description, size)?;

        StringRegistry::global().intern(name)?;

        debug!(
            component = name,
            size,
            attributes = description.attributes.len(),
            max_instances = description.max_instances,
            "registered component"
        );
        self.infos.push(ComponentInfo {
            id,
            index: self.infos.len(),
            description,
            size,
            align,
            default_bytes: bytemuck::bytes_of(&T::default()).to_vec(),
        });
        Ok(self)
    }

    /// Freeze the catalog.
    #[must_use]
    pub fn build(self) -> Arc<ComponentRegistry> {
        let by_id = self
            .infos
            .iter()
            .map(|info| (info.id, info.index))
            .collect();
        Arc::new(ComponentRegistry {
            infos: self.infos,
            by_id,
        })
    }
}

fn invalid(component: &str, attribute: &str, reason: impl Into<String>) -> RegistryError {
    RegistryError::InvalidAttribute {
        component: component.to_string(),
        attribute: attribute.to_string(),
        reason: reason.into(),
    }
}

fn check_attributes(
    component: &str,
    description: &ComponentDescription,
    size: usize,
) -> Result<(), RegistryError> {
    let attributes = &description.attributes;
    for (index, attribute) in attributes.iter().enumerate() {
        if attributes[..index].iter().any(|a| a.name == attribute.name) {
            return Err(invalid(component, &attribute.name, "duplicate name"));
        }
        if index > 0 && attribute.offset <= attributes[index - 1].offset {
            return Err(invalid(component, &attribute.name, "offsets must ascend"));
        }
        if attribute.offset > size {
            return Err(invalid(component, &attribute.name, "offset past end of struct"));
        }
        if !attribute.ty.is_numeric() && (attribute.min.is_some() || attribute.max.is_some()) {
            return Err(invalid(component, &attribute.name, "range on a non-numeric type"));
        }

        let span = description.span(index, size).len();
        if let Some(element) = attribute.ty.element_size() {
            if span < element {
                return Err(invalid(
                    component,
                    &attribute.name,
                    format!("span of {span} bytes is smaller than {element}"),
                ));
            }
            if attribute.ty.is_vector() && span % element != 0 {
                return Err(invalid(
                    component,
                    &attribute.name,
                    format!("span of {span} bytes is not a multiple of {element}"),
                ));
            }
        }
    }

    for codec in description.codec_names() {
        match description.find(codec) {
            Some(attribute) if attribute.ty == AttributeType::Custom => {}
            _ => return Err(invalid(component, codec, "codec without a custom attribute")),
        }
    }
    Ok(())
}

/// Immutable catalog of registered component types.
#[derive(Debug)]
pub struct ComponentRegistry {
    infos: Vec<ComponentInfo>,
    by_id: HashMap<ComponentId, usize>,
}

impl ComponentRegistry {
    /// Start an empty builder.
    #[must_use]
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::new()
    }

    /// Info for `id`.
    #[must_use]
    pub fn get(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.index_of(id).map(|index| &self.infos[index])
    }

    /// Registration index of `id`.
    #[must_use]
    pub fn index_of(&self, id: ComponentId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    /// Description of `T`, the same instance on every call.
    #[must_use]
    pub fn description<T: Component>(&self) -> Option<&ComponentDescription> {
        self.get(T::component_id()).map(|info| &info.description)
    }

    /// Info for the component called `name`.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&ComponentInfo> {
        self.get(ComponentId::from_name(name))
            .filter(|info| info.name() == name)
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// All types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.infos.iter()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}
