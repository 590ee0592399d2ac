//! Axis-aligned bounding boxes.

use engine_component::Component;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::transform::Transform;

/// Local-space axis-aligned bounds, used for culling and broad-phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Bounds centred on the origin with the given half extents.
    #[must_use]
    pub fn from_half_extents(half: Vec3) -> Self {
        Self { min: -half, max: half }
    }

    /// Centre point.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns `true` if the boxes overlap (touching counts).
    #[must_use]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// World-space bounds of these local bounds under `transform`.
    #[must_use]
    pub fn transformed(&self, transform: &Transform) -> Aabb {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in corners {
            let p = transform.transform_point(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Aabb { min, max }
    }
}

impl Component for Aabb {
    fn type_name() -> &'static str {
        "Aabb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersects() {
        let a = Aabb::from_half_extents(Vec3::ONE);
        let b = Aabb {
            min: Vec3::new(1.0, 0.0, 0.0),
            max: Vec3::new(3.0, 1.0, 1.0),
        };
        let c = Aabb {
            min: Vec3::splat(5.0),
            max: Vec3::splat(6.0),
        };
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_transformed_translates_and_scales() {
        let local = Aabb::from_half_extents(Vec3::ONE);
        let t = Transform {
            position: Vec3::new(10.0, 0.0, 0.0),
            scale: Vec3::splat(2.0),
            ..Transform::IDENTITY
        };
        let world = local.transformed(&t);
        assert_eq!(world.min, Vec3::new(8.0, -2.0, -2.0));
        assert_eq!(world.max, Vec3::new(12.0, 2.0, 2.0));
        assert_eq!(world.center(), Vec3::new(10.0, 0.0, 0.0));
    }
}
