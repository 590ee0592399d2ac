//! Renderer and physics synchronisation boundary.
//!
//! The world knows nothing about GPUs or solvers. Backends implement
//! [`SyncBackend`], read the frame's [`ChangeLog`] to learn which entities
//! appeared, vanished, or changed shape, and read (or write back) component
//! values through the world's ordinary accessors. Which backends run is
//! decided once at startup by [`SyncRegistry::resolve`] against the
//! capabilities the host actually has.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::change::ChangeLog;
use crate::world::World;

/// A host facility a backend depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// A GPU renderer.
    Rendering,
    /// A physics solver.
    Physics,
    /// An audio mixer.
    Audio,
}

impl Capability {
    const fn bit(self) -> u8 {
        match self {
            Self::Rendering => 1,
            Self::Physics => 1 << 1,
            Self::Audio => 1 << 2,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Rendering => "rendering",
            Self::Physics => "physics",
            Self::Audio => "audio",
        };
        f.write_str(name)
    }
}

/// The capabilities available on this host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// No capabilities (headless server, tests).
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every capability.
    #[must_use]
    pub const fn all() -> Self {
        Self(Capability::Rendering.bit() | Capability::Physics.bit() | Capability::Audio.bit())
    }

    /// This set plus `capability`.
    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    /// Returns `true` if `capability` is available.
    #[must_use]
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// Errors reported by a sync backend.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The backend failed to apply the frame's changes.
    #[error("backend '{backend}' failed: {message}")]
    Backend {
        /// Backend name.
        backend: String,
        /// What went wrong.
        message: String,
    },
}

impl SyncError {
    /// Build a [`SyncError::Backend`].
    #[must_use]
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }
}

/// Adapter between the world and an external engine subsystem.
pub trait SyncBackend: Send {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// The host capability this backend needs.
    fn capability(&self) -> Capability;

    /// Apply one frame of structural changes, plus any value reads or
    /// write-backs the backend needs.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the backend could not keep up. The error is
    /// logged; the frame continues.
    fn sync(&mut self, world: &mut World, changes: &ChangeLog) -> Result<(), SyncError>;
}

/// The backends selected for this host.
#[derive(Default)]
pub struct SyncRegistry {
    backends: Vec<Box<dyn SyncBackend>>,
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.backends.iter().map(|b| b.name()))
            .finish()
    }
}

impl SyncRegistry {
    /// Create a registry with no backends.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select backends from `candidates`: those whose capability is in
    /// `available`, first candidate per capability.
    #[must_use]
    pub fn resolve(available: CapabilitySet, candidates: Vec<Box<dyn SyncBackend>>) -> Self {
        let mut registry = Self::new();
        for backend in candidates {
            let capability = backend.capability();
            if !available.contains(capability) {
                debug!(backend = backend.name(), %capability, "capability unavailable, skipping backend");
                continue;
            }
            if registry.backend_for(capability).is_some() {
                debug!(backend = backend.name(), %capability, "capability already served, skipping backend");
                continue;
            }
            registry.register(backend);
        }
        registry
    }

    /// Add a backend unconditionally.
    pub fn register(&mut self, backend: Box<dyn SyncBackend>) {
        info!(backend = backend.name(), capability = %backend.capability(), "sync backend enabled");
        self.backends.push(backend);
    }

    /// The backend serving `capability`, if any.
    #[must_use]
    pub fn backend_for(&self, capability: Capability) -> Option<&dyn SyncBackend> {
        self.backends
            .iter()
            .find(|b| b.capability() == capability)
            .map(|b| &**b)
    }

    /// Names of the enabled backends, in sync order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.iter().map(|b| b.name())
    }

    /// Number of enabled backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Returns `true` if no backend is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Drain the world's change log and feed it to every backend in order.
    ///
    /// Backend errors are logged and returned; they never stop the other
    /// backends.
    pub fn sync_all(&mut self, world: &mut World) -> Vec<SyncError> {
        let changes = world.drain_changes();
        let mut errors = Vec::new();
        for backend in &mut self.backends {
            if let Err(error) = backend.sync(world, &changes) {
                warn!(
                    backend = backend.name(),
                    frame = changes.frame(),
                    %error,
                    "sync backend failed"
                );
                errors.push(error);
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde::{Deserialize, Serialize};

    use engine_component::{Component, Entity};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Body {
        mass: f32,
    }

    impl Component for Body {
        fn type_name() -> &'static str {
            "Body"
        }
    }

    struct Recorder {
        name: &'static str,
        capability: Capability,
        seen: Arc<Mutex<Vec<(&'static str, Vec<Entity>)>>>,
        fail: bool,
    }

    impl SyncBackend for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn capability(&self) -> Capability {
            self.capability
        }

        fn sync(&mut self, _world: &mut World, changes: &ChangeLog) -> Result<(), SyncError> {
            self.seen
                .lock()
                .unwrap()
                .push((self.name, changes.created().collect()));
            if self.fail {
                return Err(SyncError::backend(self.name, "device lost"));
            }
            Ok(())
        }
    }

    fn recorder(
        name: &'static str,
        capability: Capability,
        seen: &Arc<Mutex<Vec<(&'static str, Vec<Entity>)>>>,
    ) -> Box<dyn SyncBackend> {
        Box::new(Recorder {
            name,
            capability,
            seen: Arc::clone(seen),
            fail: false,
        })
    }

    #[test]
    fn test_capability_set() {
        let set: CapabilitySet = [Capability::Rendering, Capability::Audio].into_iter().collect();
        assert!(set.contains(Capability::Rendering));
        assert!(!set.contains(Capability::Physics));
        assert!(CapabilitySet::all().contains(Capability::Physics));
        assert!(!CapabilitySet::empty().contains(Capability::Audio));
    }

    #[test]
    fn test_resolve_filters_by_capability() {
        let seen = Arc::default();
        let registry = SyncRegistry::resolve(
            CapabilitySet::empty().with(Capability::Physics),
            vec![
                recorder("wgpu", Capability::Rendering, &seen),
                recorder("rapier", Capability::Physics, &seen),
                recorder("fallback-physics", Capability::Physics, &seen),
            ],
        );
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["rapier"]);
        assert!(registry.backend_for(Capability::Rendering).is_none());
        assert_eq!(registry.backend_for(Capability::Physics).unwrap().name(), "rapier");
    }

    #[test]
    fn test_sync_all_drains_log_once() {
        let seen = Arc::default();
        let mut registry = SyncRegistry::resolve(
            CapabilitySet::all(),
            vec![
                recorder("renderer", Capability::Rendering, &seen),
                recorder("physics", Capability::Physics, &seen),
            ],
        );

        let mut world = World::new();
        world.register::<Body>();
        world.begin_frame();
        let e = world.create_entity();
        world.add_component(e, Body { mass: 1.0 });
        world.end_frame();

        assert!(registry.sync_all(&mut world).is_empty());
        assert!(world.changes().is_empty());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("renderer", vec![e]), ("physics", vec![e])]
        );

        registry.sync_all(&mut world);
        assert_eq!(seen.lock().unwrap()[2], ("renderer", vec![]));
    }

    #[test]
    fn test_backend_error_does_not_stop_others() {
        let seen = Arc::default();
        let mut registry = SyncRegistry::new();
        registry.register(Box::new(Recorder {
            name: "flaky",
            capability: Capability::Rendering,
            seen: Arc::clone(&seen),
            fail: true,
        }));
        registry.register(recorder("physics", Capability::Physics, &seen));

        let mut world = World::new();
        let errors = registry.sync_all(&mut world);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "backend 'flaky' failed: device lost");
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
