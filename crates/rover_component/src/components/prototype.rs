use crate::attribute::{AttributeDescription, AttributeType};
use crate::component::{Component, ComponentDescription};

/// Upper bound of [`Prototype::max_clones`].
pub const MAX_CLONES: u32 = 10_000;

/// Marks an entity as a template for clones.
///
/// A [`Factory`](crate::Factory) materialises `max_clones` copies of every
/// other component the entity holds.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Prototype {
    /// Number of clones to create.
    pub max_clones: u32,
}

impl Default for Prototype {
    fn default() -> Self {
        Self { max_clones: 1 }
    }
}

impl Component for Prototype {
    fn type_name() -> &'static str {
        "Prototype"
    }

    fn describe() -> ComponentDescription {
        ComponentDescription::new("Prototype").attribute(
            AttributeDescription::new(AttributeType::UInt32, 0, "maxClones")
                .range(0.0, f64::from(MAX_CLONES)),
        )
    }
}
