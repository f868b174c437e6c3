use crate::attribute::{AttributeDescription, AttributeType};
use crate::component::{Component, ComponentDescription};
use crate::error::StringIdError;
use crate::string_id::StringId;

/// Links an entity to a script by name.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ScriptRef {
    /// Registered script name, [`StringId::NONE`] for none.
    pub script: StringId,
}

impl ScriptRef {
    /// Reference the script called `name`.
    ///
    /// # Errors
    ///
    /// Fails if `name` collides with another interned string.
    pub fn new(name: &str) -> Result<Self, StringIdError> {
        Ok(Self {
            script: StringId::new(name)?,
        })
    }
}

impl Component for ScriptRef {
    fn type_name() -> &'static str {
        "ScriptRef"
    }

    fn describe() -> ComponentDescription {
        ComponentDescription::new("ScriptRef")
            .attribute(AttributeDescription::new(AttributeType::StringId, 0, "script"))
    }
}
