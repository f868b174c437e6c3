//! Generic component serialisation.
//!
//! Components are encoded by walking their attribute descriptions, so no
//! component needs its own serializer. `Custom` attributes with a codec
//! delegate to it; without one they carry their raw bytes. The encoded form
//! is MessagePack with field names, which keeps snapshots readable by
//! other tools.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::attribute::{AttributeType, AttributeValue};
use crate::entity::EntityId;
use crate::error::SerializeError;
use crate::registry::ComponentInfo;

/// One named attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedAttribute {
    pub name: String,
    pub value: AttributeValue,
}

/// A component instance, attribute by attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedComponent {
    /// Registered component name.
    pub name: String,
    pub attributes: Vec<SerializedAttribute>,
}

/// All components of one base entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub components: Vec<SerializedComponent>,
}

/// The contents of a [`DataManager`](crate::DataManager).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entities: Vec<EntitySnapshot>,
}

impl Snapshot {
    /// Encode as MessagePack.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::Encode`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decode from MessagePack.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::Decode`] on malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializeError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Read every attribute of one instance.
///
/// # Errors
///
/// Returns [`SerializeError::Custom`] if a custom codec fails.
pub fn read_component(
    info: &ComponentInfo,
    bytes: &[u8],
    aux: &[u8],
) -> Result<SerializedComponent, SerializeError> {
    let description = &info.description;
    let attributes = description
        .attributes
        .iter()
        .enumerate()
        .map(|(index, attribute)| {
            let span = &bytes[description.span(index, info.size)];
            let value = match description.codec(&attribute.name) {
                Some(codec) if attribute.ty == AttributeType::Custom => {
                    let data = (codec.encode)(span, aux).map_err(|message| {
                        SerializeError::Custom {
                            attribute: attribute.name.clone(),
                            message,
                        }
                    })?;
                    AttributeValue::Custom(data)
                }
                _ => AttributeValue::read(attribute.ty, span),
            };
            Ok::<_, SerializeError>(SerializedAttribute {
                name: attribute.name.clone(),
                value,
            })
        })
        .collect::<Result<_, SerializeError>>()?;
    Ok(SerializedComponent {
        name: info.name().to_string(),
        attributes,
    })
}

/// Write `component` over an instance initialised to the type's default.
///
/// Attributes missing from `component` keep their default value; unknown
/// attribute names are skipped. Returns the instance bytes and payload.
///
/// # Errors
///
/// - [`SerializeError::TypeMismatch`] if a value does not fit its attribute.
/// - [`SerializeError::Custom`] if a custom codec rejects its data.
pub fn write_component(
    info: &ComponentInfo,
    component: &SerializedComponent,
) -> Result<(Vec<u8>, Vec<u8>), SerializeError> {
    let description = &info.description;
    let mut bytes = info.default_bytes.clone();
    let mut aux = Vec::new();

    for serialized in &component.attributes {
        let Some(index) = description
            .attributes
            .iter()
            .position(|a| a.name == serialized.name)
        else {
            warn!(
                component = %info.name(),
                attribute = %serialized.name,
                "skipping unknown attribute"
            );
            continue;
        };
        let attribute = &description.attributes[index];
        let span = &mut bytes[description.span(index, info.size)];

        match (description.codec(&attribute.name), &serialized.value) {
            (Some(codec), AttributeValue::Custom(data)) if attribute.ty == AttributeType::Custom => {
                (codec.decode)(data, span, &mut aux).map_err(|message| SerializeError::Custom {
                    attribute: attribute.name.clone(),
                    message,
                })?;
            }
            (_, value) => value.write(attribute.ty, &attribute.name, span)?,
        }
    }
    Ok((bytes, aux))
}

/// Encode one instance as MessagePack.
///
/// # Errors
///
/// Returns [`SerializeError::Encode`] if encoding fails, or any error from
/// [`read_component`].
pub fn encode_component(
    info: &ComponentInfo,
    bytes: &[u8],
    aux: &[u8],
) -> Result<Vec<u8>, SerializeError> {
    Ok(rmp_serde::to_vec_named(&read_component(info, bytes, aux)?)?)
}

/// Decode one instance from MessagePack.
///
/// # Errors
///
/// - [`SerializeError::Decode`] on malformed input.
/// - [`SerializeError::UnknownComponent`] if the data names another type.
/// - Any error from [`write_component`].
pub fn decode_component(
    info: &ComponentInfo,
    data: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), SerializeError> {
    let component: SerializedComponent = rmp_serde::from_slice(data)?;
    if component.name != info.name() {
        return Err(SerializeError::UnknownComponent(component.name));
    }
    write_component(info, &component)
}
