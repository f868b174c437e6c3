//! 3D transform component.
//!
//! [`Transform`] stores position, orientation and scale as plain `f32`
//! data so it can live in a component pool. The orientation is kept as an
//! `[x, y, z, w]` array rather than a SIMD [`Quat`], which would pad the
//! struct to 16-byte alignment.

use std::mem::offset_of;

use glam::{Quat, Vec3};
use rover_component::{AttributeDescription, AttributeType, Component, ComponentDescription};
use serde::{Deserialize, Serialize};

/// Position, orientation and scale of an entity.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Transform {
    /// World-space position.
    pub position: Vec3,
    /// Unit quaternion, `[x, y, z, w]`.
    pub orientation: [f32; 4],
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform {
    /// Origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: [0.0, 0.0, 0.0, 1.0],
        scale: Vec3::ONE,
    };

    /// Identity rotation and scale at `position`.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// The orientation as a [`Quat`].
    #[must_use]
    pub fn rotation(&self) -> Quat {
        Quat::from_array(self.orientation)
    }

    /// Replace the orientation.
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.orientation = rotation.to_array();
    }

    /// The 4x4 model matrix.
    #[must_use]
    pub fn to_matrix(&self) -> glam::Mat4 {
        glam::Mat4::from_scale_rotation_translation(self.scale, self.rotation(), self.position)
    }

    /// Translate by `offset`.
    #[must_use]
    pub fn translated(mut self, offset: Vec3) -> Self {
        self.position += offset;
        self
    }

    /// Apply `rotation` on top of the current orientation.
    #[must_use]
    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.set_rotation(rotation * self.rotation());
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Component for Transform {
    fn type_name() -> &'static str {
        "Transform"
    }

    fn describe() -> ComponentDescription {
        ComponentDescription::new("Transform")
            .attribute(
                AttributeDescription::new(
                    AttributeType::VectorFloat32,
                    offset_of!(Transform, position),
                    "position",
                )
                .range(-1000.0, 1000.0)
                .step(0.05),
            )
            .attribute(
                AttributeDescription::new(
                    AttributeType::Quat,
                    offset_of!(Transform, orientation),
                    "orientation",
                )
                .step(0.01),
            )
            .attribute(
                AttributeDescription::new(
                    AttributeType::VectorFloat32,
                    offset_of!(Transform, scale),
                    "scale",
                )
                .range(0.0, 1000.0)
                .step(0.05),
            )
    }
}

#[cfg(test)]
mod tests {
    use rover_component::{ComponentRegistry, DataManager, Entity, serialize};

    use super::*;

    #[test]
    fn test_identity_transform() {
        let t = Transform::IDENTITY;
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation(), Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.to_matrix(), glam::Mat4::IDENTITY);
    }

    #[test]
    fn test_layout_has_no_padding() {
        assert_eq!(std::mem::size_of::<Transform>(), 40);
        assert_eq!(offset_of!(Transform, orientation), 12);
        assert_eq!(offset_of!(Transform, scale), 28);
    }

    #[test]
    fn test_translated_and_rotated() {
        let t = Transform::IDENTITY
            .translated(Vec3::new(5.0, 0.0, 0.0))
            .rotated(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        assert_eq!(t.position, Vec3::new(5.0, 0.0, 0.0));
        let turned = t.rotation() * Vec3::X;
        assert!((turned - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_default_in_data_manager() {
        let registry = ComponentRegistry::builder()
            .register::<Transform>()
            .unwrap()
            .build();
        let mut dm = DataManager::new(registry, 4);
        let e0 = dm.create_entity(None).unwrap();
        dm.add_component(e0, Transform::component_id()).unwrap();
        assert_eq!(dm.get::<Transform>(e0).unwrap().position, Vec3::ZERO);

        dm.remove::<Transform>(e0).unwrap();
        assert!(dm.get::<Transform>(e0).is_none());
        assert!(Entity::new(0).get::<Transform>(&dm).is_none());
    }

    #[test]
    fn test_attribute_round_trip() {
        let registry = ComponentRegistry::builder()
            .register::<Transform>()
            .unwrap()
            .build();
        let info = registry.get(Transform::component_id()).unwrap();
        let mut t = Transform::from_position(Vec3::new(1.5, -2.25, 900.0));
        t.set_rotation(Quat::from_rotation_y(0.3));
        t.scale = Vec3::splat(0.05);

        let data = serialize::encode_component(info, bytemuck::bytes_of(&t), &[]).unwrap();
        let (bytes, _) = serialize::decode_component(info, &data).unwrap();
        assert_eq!(bytemuck::pod_read_unaligned::<Transform>(&bytes), t);
    }

    #[test]
    fn test_validation_flags_out_of_range_position() {
        let t = Transform::from_position(Vec3::new(0.0, 1001.0, 0.0));
        let violations = Transform::describe().validate(bytemuck::bytes_of(&t));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].attribute, "position");
    }

    #[test]
    fn test_orientation_carries_no_range() {
        let description = Transform::describe();
        let orientation = description.find("orientation").unwrap();
        assert_eq!(orientation.ty, AttributeType::Quat);
        assert!(orientation.min.is_none() && orientation.max.is_none());
    }
}
