//! Pending structural changes and the [`Commands`] buffer that collects them.
//!
//! Systems never touch component storages structurally. They queue
//! [`PendingChange`]s, which the world applies in submission order at
//! [`World::commit`](crate::World::commit).

use std::any::Any;
use std::sync::Arc;

use engine_component::{Component, ComponentTypeId, EcsError, Entity};

/// A queued structural change.
pub enum PendingChange {
    /// Destroy the entity and every component it holds.
    Destroy {
        /// Target entity.
        entity: Entity,
    },
    /// Attach a component.
    Add {
        /// Target entity.
        entity: Entity,
        /// Component type of `payload`.
        component: ComponentTypeId,
        /// Stable component name.
        name: &'static str,
        /// The component value.
        payload: Box<dyn Any + Send + Sync>,
    },
    /// Detach a component.
    Remove {
        /// Target entity.
        entity: Entity,
        /// Component type to remove.
        component: ComponentTypeId,
        /// Stable component name.
        name: &'static str,
    },
}

impl PendingChange {
    /// Queue a typed component add.
    #[must_use]
    pub fn add<T: Component>(entity: Entity, value: T) -> Self {
        Self::Add {
            entity,
            component: T::component_type_id(),
            name: T::type_name(),
            payload: Box::new(value),
        }
    }

    /// Queue a typed component remove.
    #[must_use]
    pub fn remove<T: Component>(entity: Entity) -> Self {
        Self::Remove {
            entity,
            component: T::component_type_id(),
            name: T::type_name(),
        }
    }

    /// The entity this change targets.
    #[must_use]
    pub fn entity(&self) -> Entity {
        match self {
            Self::Destroy { entity } | Self::Add { entity, .. } | Self::Remove { entity, .. } => {
                *entity
            }
        }
    }

    /// The component type this change targets, if any.
    #[must_use]
    pub fn component(&self) -> Option<ComponentTypeId> {
        match self {
            Self::Destroy { .. } => None,
            Self::Add { component, .. } | Self::Remove { component, .. } => Some(*component),
        }
    }

    /// Payload-free summary for logs and failure reports.
    #[must_use]
    pub fn label(&self) -> ChangeLabel {
        match self {
            Self::Destroy { entity } => ChangeLabel::Destroy(*entity),
            Self::Add { entity, name, .. } => ChangeLabel::Add(*entity, *name),
            Self::Remove { entity, name, .. } => ChangeLabel::Remove(*entity, *name),
        }
    }
}

impl std::fmt::Debug for PendingChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// What a [`PendingChange`] does, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeLabel {
    /// Destroy an entity.
    Destroy(Entity),
    /// Add the named component to an entity.
    Add(Entity, &'static str),
    /// Remove the named component from an entity.
    Remove(Entity, &'static str),
}

impl ChangeLabel {
    /// The targeted entity.
    #[must_use]
    pub fn entity(self) -> Entity {
        match self {
            Self::Destroy(entity) | Self::Add(entity, _) | Self::Remove(entity, _) => entity,
        }
    }
}

impl std::fmt::Display for ChangeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Destroy(entity) => write!(f, "destroy {entity}"),
            Self::Add(entity, name) => write!(f, "add '{name}' to {entity}"),
            Self::Remove(entity, name) => write!(f, "remove '{name}' from {entity}"),
        }
    }
}

/// A pending change tagged with the name of whoever queued it.
#[derive(Debug)]
pub struct QueuedChange {
    /// The system (or other caller) that queued the change.
    pub origin: Option<Arc<str>>,
    /// The change itself.
    pub change: PendingChange,
}

/// An owned, ordered buffer of structural changes.
///
/// Usable while a [`View`](crate::View) borrows the world: collect changes
/// during iteration, then hand the buffer to
/// [`World::submit`](crate::World::submit).
#[derive(Debug, Default)]
pub struct Commands {
    origin: Option<Arc<str>>,
    changes: Vec<PendingChange>,
}

impl Commands {
    /// Create an empty, anonymous buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer whose changes report `origin` on failure.
    #[must_use]
    pub fn with_origin(origin: impl Into<Arc<str>>) -> Self {
        Self {
            origin: Some(origin.into()),
            changes: Vec::new(),
        }
    }

    /// Name reported for failures of changes in this buffer.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Queue destruction of `entity`.
    pub fn destroy_entity(&mut self, entity: Entity) -> &mut Self {
        self.push(PendingChange::Destroy { entity })
    }

    /// Queue attaching `value` to `entity`.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> &mut Self {
        self.push(PendingChange::add(entity, value))
    }

    /// Queue detaching `T` from `entity`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> &mut Self {
        self.push(PendingChange::remove::<T>(entity))
    }

    /// Queue a prebuilt change.
    pub fn push(&mut self, change: PendingChange) -> &mut Self {
        self.changes.push(change);
        self
    }

    /// Move every change from `other` to the end of this buffer. The moved
    /// changes take this buffer's origin.
    pub fn append(&mut self, other: &mut Commands) {
        self.changes.append(&mut other.changes);
    }

    /// Number of queued changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Queued changes, in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.changes.iter()
    }

    /// Tag each change with this buffer's origin, in order.
    pub(crate) fn into_queued(self) -> impl Iterator<Item = QueuedChange> {
        let origin = self.origin;
        self.changes.into_iter().map(move |change| QueuedChange {
            origin: origin.clone(),
            change,
        })
    }
}

/// One queued change that could not be applied at commit.
#[derive(Debug, Clone)]
pub struct CommitFailure {
    /// Who queued the change.
    pub origin: Option<Arc<str>>,
    /// The rejected change.
    pub change: ChangeLabel,
    /// Why it was rejected.
    pub error: EcsError,
}

/// Outcome of one [`World::commit`](crate::World::commit).
#[derive(Debug, Default)]
pub struct CommitReport {
    /// Changes applied successfully.
    pub applied: usize,
    /// Changes rejected, in application order.
    pub failures: Vec<CommitFailure>,
}

impl CommitReport {
    /// Returns `true` if every queued change applied.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures queued by `origin`.
    pub fn failures_from<'a>(&'a self, origin: &'a str) -> impl Iterator<Item = &'a CommitFailure> {
        self.failures
            .iter()
            .filter(move |f| f.origin.as_deref() == Some(origin))
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: CommitReport) {
        self.applied += other.applied;
        self.failures.extend(other.failures);
    }
}
