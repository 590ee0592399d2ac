//! Recoverable ECS error types.

use crate::entity::Entity;

/// Errors returned by handle and storage operations.
///
/// All variants are recoverable: they describe a runtime condition the
/// caller may log, retry, or drop. Programming errors (breaking the
/// queue/commit protocol) panic instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The handle refers to a destroyed or never-issued entity.
    #[error("stale entity handle {0}")]
    StaleHandle(Entity),

    /// The entity already holds a component of this type.
    #[error("{entity} already has component '{component}'")]
    DuplicateComponent {
        /// The entity the add targeted.
        entity: Entity,
        /// Stable name of the component type.
        component: &'static str,
    },

    /// The entity holds no component of this type.
    #[error("{entity} has no component '{component}'")]
    MissingComponent {
        /// The entity the remove targeted.
        entity: Entity,
        /// Stable name of the component type.
        component: &'static str,
    },
}
