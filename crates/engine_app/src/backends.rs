//! Logging stand-ins for the renderer and physics backends.
//!
//! Both mirror what a real adapter does with the change log: allocate
//! external resources for new entities, release them for dead ones, and touch
//! component values only through the world's accessors.

use std::collections::HashMap;

use tracing::{debug, info};

use engine_component::{Component, Entity};
use engine_ecs::{Capability, ChangeKind, ChangeLog, SyncBackend, SyncError, World};
use engine_math::Transform;

use crate::components::{MeshRenderer, RigidBody};

/// Tracks one GPU instance per drawable entity.
#[derive(Debug, Default)]
pub struct LogRenderer {
    instances: HashMap<Entity, MeshRenderer>,
}

impl LogRenderer {
    /// Number of live GPU instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

impl SyncBackend for LogRenderer {
    fn name(&self) -> &str {
        "log-renderer"
    }

    fn capability(&self) -> Capability {
        Capability::Rendering
    }

    fn sync(&mut self, world: &mut World, changes: &ChangeLog) -> Result<(), SyncError> {
        let mesh_type = MeshRenderer::component_type_id();
        for record in changes.for_component(mesh_type) {
            match record.kind {
                ChangeKind::ComponentAdded => {
                    let Some(renderer) = world.get::<MeshRenderer>(record.entity) else {
                        // Added and removed again within the frame.
                        continue;
                    };
                    debug!(entity = %record.entity, mesh = renderer.mesh.0, "upload instance");
                    self.instances.insert(record.entity, *renderer);
                }
                ChangeKind::ComponentRemoved => {
                    if self.instances.remove(&record.entity).is_some() {
                        debug!(entity = %record.entity, "release instance");
                    }
                }
                ChangeKind::Created | ChangeKind::Destroyed => {}
            }
        }

        let visible = self
            .instances
            .keys()
            .filter(|&&entity| world.has::<Transform>(entity))
            .count();
        if !changes.is_empty() {
            info!(frame = changes.frame(), instances = self.instances.len(), visible, "render sync");
        }
        Ok(())
    }
}

/// Hands out solver bodies and writes their handles back into `RigidBody`.
#[derive(Debug, Default)]
pub struct LogPhysics {
    next_handle: u64,
    bodies: HashMap<Entity, u64>,
}

impl LogPhysics {
    /// Number of live solver bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

impl SyncBackend for LogPhysics {
    fn name(&self) -> &str {
        "log-physics"
    }

    fn capability(&self) -> Capability {
        Capability::Physics
    }

    fn sync(&mut self, world: &mut World, changes: &ChangeLog) -> Result<(), SyncError> {
        let mut rejected = Vec::new();
        for record in changes.for_component(RigidBody::component_type_id()) {
            match record.kind {
                ChangeKind::ComponentAdded => {
                    let Some(body) = world.get_mut::<RigidBody>(record.entity) else {
                        continue;
                    };
                    if body.mass < 0.0 {
                        rejected.push(record.entity.to_string());
                        continue;
                    }
                    self.next_handle += 1;
                    body.body_handle = Some(self.next_handle);
                    self.bodies.insert(record.entity, self.next_handle);
                    debug!(entity = %record.entity, handle = self.next_handle, "create body");
                }
                ChangeKind::ComponentRemoved => {
                    if let Some(handle) = self.bodies.remove(&record.entity) {
                        debug!(entity = %record.entity, handle, "remove body");
                    }
                }
                ChangeKind::Created | ChangeKind::Destroyed => {}
            }
        }
        if rejected.is_empty() {
            Ok(())
        } else {
            Err(SyncError::backend(
                "log-physics",
                format!("negative mass on {}", rejected.join(", ")),
            ))
        }
    }
}
