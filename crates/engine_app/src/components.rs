//! Demo component types.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use engine_component::{AssetId, Component};
use engine_ecs::World;
use engine_math::{Aabb, Transform};

/// Linear velocity in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Velocity(pub Vec3);

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

/// Seconds left before the entity is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lifetime {
    /// Remaining time in seconds.
    pub remaining: f32,
}

impl Component for Lifetime {
    fn type_name() -> &'static str {
        "Lifetime"
    }
}

/// Something the renderer should draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshRenderer {
    /// Mesh asset.
    pub mesh: AssetId,
    /// Material asset.
    pub material: AssetId,
}

impl Component for MeshRenderer {
    fn type_name() -> &'static str {
        "MeshRenderer"
    }
}

/// A body the physics backend simulates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    /// Mass in kilograms; zero marks a static body.
    pub mass: f32,
    /// Solver-side handle, written back by the physics backend.
    #[serde(skip)]
    pub body_handle: Option<u64>,
}

impl RigidBody {
    /// A dynamic body of the given mass, not yet known to the solver.
    #[must_use]
    pub fn dynamic(mass: f32) -> Self {
        Self {
            mass,
            body_handle: None,
        }
    }
}

impl Component for RigidBody {
    fn type_name() -> &'static str {
        "RigidBody"
    }
}

/// Register every demo component with `world`.
pub fn register_all(world: &mut World) {
    world.register::<Transform>();
    world.register::<Aabb>();
    world.register::<Velocity>();
    world.register::<Lifetime>();
    world.register::<MeshRenderer>();
    world.register::<RigidBody>();
}
