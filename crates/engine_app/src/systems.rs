//! Demo gameplay systems.

use glam::{Quat, Vec3};
use tracing::{debug, warn};

use engine_component::{Access, AssetId, QueryDescriptor};
use engine_ecs::{CommitFailure, System, SystemContext, system_fn};
use engine_math::{Aabb, Transform};

use crate::components::{Lifetime, MeshRenderer, RigidBody, Velocity};

/// Mesh used for spawned projectiles.
pub const PROJECTILE_MESH: AssetId = AssetId(0x0001_0001);
/// Material used for spawned projectiles.
pub const PROJECTILE_MATERIAL: AssetId = AssetId(0x0002_0001);

/// Integrates `Velocity` into `Transform`.
pub fn movement() -> impl System {
    system_fn(
        "movement",
        Access::new().read::<Velocity>().write::<Transform>(),
        |ctx| {
            let dt = ctx.dt() as f32;
            let moving: Vec<_> = ctx
                .query(&QueryDescriptor::new().with::<Transform>().with::<Velocity>())
                .components::<Velocity>()
                .map(|(entity, velocity)| (entity, velocity.0))
                .collect();
            for (entity, velocity) in moving {
                if let Some(transform) = ctx.get_mut::<Transform>(entity) {
                    transform.integrate(velocity, dt);
                }
            }
        },
    )
}

/// Counts down `Lifetime` and destroys entities whose time ran out.
pub fn lifetime() -> impl System {
    system_fn("lifetime", Access::new().write::<Lifetime>(), |ctx| {
        let dt = ctx.dt() as f32;
        let mut expired = Vec::new();
        ctx.for_each_mut::<Lifetime, _>(&QueryDescriptor::new().with::<Lifetime>(), |entity, life| {
            life.remaining -= dt;
            if life.remaining <= 0.0 {
                expired.push(entity);
            }
        });
        for entity in expired {
            ctx.destroy_entity(entity);
        }
    })
}

/// Spawns a projectile every `interval` seconds, fanning out around the Y
/// axis.
#[derive(Debug)]
pub struct Spawner {
    interval: f32,
    lifetime: f32,
    speed: f32,
    elapsed: f32,
    spawned: u64,
}

impl Spawner {
    /// Spawn every `interval` seconds; projectiles live `lifetime` seconds.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is not positive.
    #[must_use]
    pub fn new(interval: f32, lifetime: f32) -> Self {
        assert!(interval > 0.0, "spawn interval must be positive, got {interval}");
        Self {
            interval,
            lifetime,
            speed: 4.0,
            elapsed: 0.0,
            spawned: 0,
        }
    }

    /// Number of projectiles spawned so far.
    #[must_use]
    pub fn spawned(&self) -> u64 {
        self.spawned
    }

    fn spawn(&mut self, ctx: &mut SystemContext<'_>) {
        let angle = self.spawned as f32 * 0.618_034 * std::f32::consts::TAU;
        let direction = Quat::from_rotation_y(angle) * Vec3::NEG_Z;

        let entity = ctx.create_entity();
        ctx.commands()
            .add_component(entity, Transform::from_position(Vec3::ZERO))
            .add_component(entity, Aabb::from_half_extents(Vec3::splat(0.25)))
            .add_component(entity, Velocity(direction * self.speed))
            .add_component(
                entity,
                Lifetime {
                    remaining: self.lifetime,
                },
            )
            .add_component(
                entity,
                MeshRenderer {
                    mesh: PROJECTILE_MESH,
                    material: PROJECTILE_MATERIAL,
                },
            )
            .add_component(entity, RigidBody::dynamic(1.0));
        self.spawned += 1;
        debug!(%entity, spawned = self.spawned, "spawned projectile");
    }
}

impl System for Spawner {
    fn name(&self) -> &str {
        "spawner"
    }

    fn access(&self) -> Access {
        Access::new()
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) {
        self.elapsed += ctx.dt() as f32;
        while self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            self.spawn(ctx);
        }
    }

    fn on_commit_failures(&mut self, failures: &[CommitFailure]) {
        for failure in failures {
            warn!(change = %failure.change, error = %failure.error, "spawn rejected");
        }
    }
}
