//! # engine_math
//!
//! Spatial components shared by gameplay systems and the renderer/physics
//! adapters. Re-exports [`glam`] for linear algebra.

pub mod bounds;
pub mod transform;

pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

pub use bounds::Aabb;
pub use transform::Transform;
