use crate::attribute::{AttributeDescription, AttributeType};
use crate::component::{Component, ComponentDescription, CustomCodec};
use crate::data_manager::DataManager;
use crate::entity::Entity;
use crate::error::DataError;

/// A 2D convex polygon collider.
///
/// The fixed-size header lives in the pool; the vertex list is the slot's
/// auxiliary payload, packed as `[f32; 2]` pairs.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PolygonCollider2D {
    /// Offset from the entity origin.
    pub offset: [f32; 2],
    /// Number of vertices in the payload.
    pub point_count: u32,
    _reserved: u32,
}

const POINT_SIZE: usize = std::mem::size_of::<[f32; 2]>();

fn encode_points(_span: &[u8], aux: &[u8]) -> Result<Vec<u8>, String> {
    let points = decode_payload(aux);
    rmp_serde::to_vec(&points).map_err(|e| e.to_string())
}

fn decode_points(data: &[u8], span: &mut [u8], aux: &mut Vec<u8>) -> Result<(), String> {
    let points: Vec<[f32; 2]> = rmp_serde::from_slice(data).map_err(|e| e.to_string())?;
    let count = u32::try_from(points.len()).map_err(|e| e.to_string())?;
    span[..4].copy_from_slice(&count.to_ne_bytes());
    *aux = bytemuck::cast_slice(&points).to_vec();
    Ok(())
}

fn decode_payload(aux: &[u8]) -> Vec<[f32; 2]> {
    aux.chunks_exact(POINT_SIZE)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

impl PolygonCollider2D {
    /// A collider with no vertices yet, shifted by `offset`.
    #[must_use]
    pub fn new(offset: [f32; 2]) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    /// Vertices of `entity`'s collider.
    #[must_use]
    pub fn points(data: &DataManager, entity: Entity) -> Option<Vec<[f32; 2]>> {
        let aux = data.aux(entity, Self::component_id())?;
        Some(decode_payload(aux))
    }

    /// Replace the vertices of `entity`'s collider.
    ///
    /// # Errors
    ///
    /// - [`DataError::ComponentNotFound`] if `entity` has no collider.
    /// - [`DataError::PayloadTooLarge`] if the vertex count does not fit a
    ///   `u32`; the collider is left unchanged.
    pub fn set_points(
        data: &mut DataManager,
        entity: Entity,
        points: &[[f32; 2]],
    ) -> Result<(), DataError> {
        let not_found = || DataError::ComponentNotFound {
            entity,
            component: Self::type_name().to_string(),
        };
        let count = u32::try_from(points.len()).map_err(|_| DataError::PayloadTooLarge {
            component: Self::type_name().to_string(),
            len: points.len(),
        })?;
        let header = data.get_mut::<Self>(entity).ok_or_else(not_found)?;
        header.point_count = count;
        let aux = data.aux_mut(entity, Self::component_id()).ok_or_else(not_found)?;
        *aux = bytemuck::cast_slice(points).to_vec();
        Ok(())
    }
}

impl Component for PolygonCollider2D {
    fn type_name() -> &'static str {
        "PolygonCollider2D"
    }

    fn describe() -> ComponentDescription {
        ComponentDescription::new("PolygonCollider2D")
            .attribute(
                AttributeDescription::new(
                    AttributeType::VectorFloat32,
                    std::mem::offset_of!(PolygonCollider2D, offset),
                    "offset",
                )
                .range(-2000.0, 2000.0)
                .step(0.01),
            )
            .attribute(AttributeDescription::new(
                AttributeType::Custom,
                std::mem::offset_of!(PolygonCollider2D, point_count),
                "points",
            ))
            .max_instances(4096)
            .variable_length()
            .custom_codec(
                "points",
                CustomCodec {
                    encode: encode_points,
                    decode: decode_points,
                },
            )
    }
}
