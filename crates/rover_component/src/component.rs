//! Core [`Component`] trait and its reflection metadata.
//!
//! Components are plain-old-data records (`bytemuck::Pod`) stored packed in
//! byte arenas. Each type publishes a [`ComponentDescription`] once, when it
//! is registered, and that description drives serialisation, validation,
//! and the editor's property grid.
//!
//! ## Type identity
//!
//! [`ComponentId`] is the [`StringId`] of the component's type name, so the
//! same name always yields the same id, in every run and every tool.

use std::fmt;
use std::sync::Arc;

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeDescription, AttributeType, AttributeValue};
use crate::string_id::StringId;

/// Default pool size for a component type.
pub const DEFAULT_MAX_INSTANCES: u32 = 1024;

/// Identifies a component *type*, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub StringId);

impl ComponentId {
    /// Compute the id for a component name without interning it.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        Self(StringId::hash(name))
    }

    /// Returns the id of component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        T::component_id()
    }

    /// Returns the component's name, or `""` if it was never registered.
    #[must_use]
    pub fn name(self) -> Arc<str> {
        self.0.as_str()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The core component trait.
///
/// Components must be `Pod` so they can live in untyped arenas and be
/// viewed back as `&T` without copies. Fields that need variable-length
/// payloads (point lists and similar) keep them in the pool's auxiliary
/// storage; see [`ComponentDescription::variable_length`].
///
/// # Examples
///
/// ```rust
/// use rover_component::{AttributeDescription, AttributeType, Component, ComponentDescription};
///
/// #[repr(C)]
/// #[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
/// struct Battery {
///     charge: f32,
///     capacity: f32,
/// }
///
/// impl Component for Battery {
///     fn type_name() -> &'static str { "Battery" }
///
///     fn describe() -> ComponentDescription {
///         ComponentDescription::new("Battery")
///             .attribute(AttributeDescription::new(AttributeType::Float32, 0, "charge").range(0.0, 1.0))
///             .attribute(AttributeDescription::new(AttributeType::Float32, 4, "capacity"))
///     }
/// }
/// ```
pub trait Component: Pod + Default + Send + Sync + 'static {
    /// A human-readable, unique name for this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentId`] for this component.
    fn component_id() -> ComponentId {
        ComponentId::from_name(Self::type_name())
    }

    /// Returns the reflection metadata for this type.
    ///
    /// The default treats the whole struct as a single opaque attribute.
    fn describe() -> ComponentDescription {
        ComponentDescription::new(Self::type_name())
            .attribute(AttributeDescription::new(AttributeType::Custom, 0, "custom"))
    }
}

/// Encoder/decoder pair for a `Custom` attribute whose data lives outside
/// the fixed-size slot.
///
/// `encode` receives the attribute span and the slot's auxiliary payload.
/// `decode` rebuilds both from the encoded bytes.
#[derive(Debug, Clone, Copy)]
pub struct CustomCodec {
    /// Produce the serialised form; `Err` carries a message.
    pub encode: fn(span: &[u8], aux: &[u8]) -> Result<Vec<u8>, String>,
    /// Restore the span and payload; `Err` carries a message.
    pub decode: fn(data: &[u8], span: &mut [u8], aux: &mut Vec<u8>) -> Result<(), String>,
}

/// An attribute whose value falls outside its declared range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeViolation {
    /// Attribute name.
    pub attribute: String,
    /// Offending value.
    pub value: f64,
    /// Declared lower bound.
    pub min: Option<f64>,
    /// Declared upper bound.
    pub max: Option<f64>,
}

/// Immutable per-type metadata.
#[derive(Debug, Clone)]
pub struct ComponentDescription {
    /// Display name.
    pub name: String,
    /// Attributes in ascending offset order.
    pub attributes: Vec<AttributeDescription>,
    /// Pool capacity for this type.
    pub max_instances: u32,
    /// Whether each instance owns an auxiliary byte payload.
    pub variable_length: bool,
    custom_codecs: Vec<(String, CustomCodec)>,
}

impl ComponentDescription {
    /// Start a description with no attributes and the default capacity.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            max_instances: DEFAULT_MAX_INSTANCES,
            variable_length: false,
            custom_codecs: Vec::new(),
        }
    }

    /// Append an attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: AttributeDescription) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Override the pool capacity.
    #[must_use]
    pub fn max_instances(mut self, max: u32) -> Self {
        self.max_instances = max;
        self
    }

    /// Give every instance an auxiliary payload.
    #[must_use]
    pub fn variable_length(mut self) -> Self {
        self.variable_length = true;
        self
    }

    /// Attach a codec to the `Custom` attribute called `attribute`.
    #[must_use]
    pub fn custom_codec(mut self, attribute: impl Into<String>, codec: CustomCodec) -> Self {
        self.custom_codecs.push((attribute.into(), codec));
        self
    }

    /// Returns the codec registered for `attribute`.
    #[must_use]
    pub fn codec(&self, attribute: &str) -> Option<&CustomCodec> {
        self.custom_codecs
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, codec)| codec)
    }

    /// Names of the attributes that have a codec.
    pub fn codec_names(&self) -> impl Iterator<Item = &str> {
        self.custom_codecs.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the attribute called `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&AttributeDescription> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Byte range of attribute `index` inside a struct of `component_size`
    /// bytes.
    #[must_use]
    pub fn span(&self, index: usize, component_size: usize) -> std::ops::Range<usize> {
        let start = self.attributes[index].offset;
        let end = self
            .attributes
            .get(index + 1)
            .map_or(component_size, |next| next.offset);
        start..end
    }

    /// Check every ranged numeric attribute in `bytes`.
    #[must_use]
    pub fn validate(&self, bytes: &[u8]) -> Vec<RangeViolation> {
        let mut violations = Vec::new();
        for (index, attribute) in self.attributes.iter().enumerate() {
            if !attribute.ty.is_numeric() || (attribute.min.is_none() && attribute.max.is_none()) {
                continue;
            }
            let value = AttributeValue::read(attribute.ty, &bytes[self.span(index, bytes.len())]);
            for v in value.numeric() {
                let below = attribute.min.is_some_and(|min| v < min);
                let above = attribute.max.is_some_and(|max| v > max);
                if below || above {
                    violations.push(RangeViolation {
                        attribute: attribute.name.clone(),
                        value: v,
                        min: attribute.min,
                        max: attribute.max,
                    });
                }
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Wheel {
        radius: f32,
        torque: [f32; 2],
    }

    impl Component for Wheel {
        fn type_name() -> &'static str {
            "Wheel"
        }

        fn describe() -> ComponentDescription {
            ComponentDescription::new("Wheel")
                .attribute(
                    AttributeDescription::new(
                        AttributeType::Float32,
                        std::mem::offset_of!(Wheel, radius),
                        "radius",
                    )
                    .range(0.0, 2.0)
                    .step(0.01),
                )
                .attribute(
                    AttributeDescription::new(
                        AttributeType::VectorFloat32,
                        std::mem::offset_of!(Wheel, torque),
                        "torque",
                    )
                    .range(-10.0, 10.0),
                )
        }
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
    struct Opaque {
        raw: [u8; 4],
    }

    impl Component for Opaque {
        fn type_name() -> &'static str {
            "Opaque"
        }
    }

    #[test]
    fn test_component_id_is_stable() {
        assert_eq!(Wheel::component_id(), ComponentId::from_name("Wheel"));
        assert_eq!(ComponentId::of::<Wheel>(), Wheel::component_id());
        assert_ne!(Wheel::component_id(), Opaque::component_id());
    }

    #[test]
    fn test_default_description_is_single_custom_attribute() {
        let desc = Opaque::describe();
        assert_eq!(desc.name, "Opaque");
        assert_eq!(desc.attributes.len(), 1);
        assert_eq!(desc.attributes[0].ty, AttributeType::Custom);
        assert_eq!(desc.max_instances, DEFAULT_MAX_INSTANCES);
        assert!(!desc.variable_length);
    }

    #[test]
    fn test_spans_follow_offsets() {
        let desc = Wheel::describe();
        let size = std::mem::size_of::<Wheel>();
        assert_eq!(desc.span(0, size), 0..4);
        assert_eq!(desc.span(1, size), 4..12);
    }

    #[test]
    fn test_validate_reports_out_of_range() {
        let desc = Wheel::describe();
        let wheel = Wheel {
            radius: 3.0,
            torque: [1.0, -11.0],
        };
        let violations = desc.validate(bytemuck::bytes_of(&wheel));
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].attribute, "radius");
        assert_eq!(violations[1].attribute, "torque");
        assert_eq!(violations[1].value, -11.0);

        let ok = Wheel {
            radius: 0.5,
            torque: [0.0, 0.0],
        };
        assert!(desc.validate(bytemuck::bytes_of(&ok)).is_empty());
    }

    #[test]
    fn test_find_attribute() {
        let desc = Wheel::describe();
        assert_eq!(desc.find("torque").unwrap().ty, AttributeType::VectorFloat32);
        assert!(desc.find("missing").is_none());
        assert!(desc.codec("torque").is_none());
    }
}
