//! # rover_math
//!
//! Math types for the rover simulator. Re-exports [`glam`] for linear
//! algebra and defines the spatial [`Transform`] component.

pub mod transform;

pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

pub use transform::Transform;
