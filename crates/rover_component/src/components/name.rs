use crate::attribute::{AttributeDescription, AttributeType};
use crate::component::{Component, ComponentDescription};

/// Display name of an entity, stored inline as NUL-padded UTF-8.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Name {
    /// Text bytes, truncated to [`Name::CAPACITY`].
    pub value: [u8; Name::CAPACITY],
}

impl Name {
    /// Maximum name length in bytes.
    pub const CAPACITY: usize = 32;

    /// Build a name, truncating at a character boundary if needed.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut end = text.len().min(Self::CAPACITY);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let mut value = [0u8; Self::CAPACITY];
        value[..end].copy_from_slice(&text.as_bytes()[..end]);
        Self { value }
    }

    /// The stored text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        let end = self
            .value
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(Self::CAPACITY);
        std::str::from_utf8(&self.value[..end]).unwrap_or_default()
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::new("Entity")
    }
}

impl Component for Name {
    fn type_name() -> &'static str {
        "Name"
    }

    fn describe() -> ComponentDescription {
        ComponentDescription::new("Name")
            .attribute(AttributeDescription::new(AttributeType::Char, 0, "name"))
    }
}
