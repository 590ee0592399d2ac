//! World state for one scene.
//!
//! The [`World`] owns the handle allocator and one component storage per
//! registered type. Entity creation is immediate; every other structural
//! change is queued and applied at [`World::commit`], the only point at which
//! storages change shape.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};
use uuid::Uuid;

use engine_component::{
    AnyStorage, Component, ComponentStorage, ComponentTypeId, EcsError, Entity, EntityAllocator,
    QueryDescriptor,
};

use crate::change::{ChangeKind, ChangeLog};
use crate::command::{CommitFailure, CommitReport, Commands, PendingChange, QueuedChange};
use crate::config::WorldConfig;
use crate::registry::ComponentRegistry;
use crate::view::View;

/// Identity of one world instance, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldId(Uuid);

impl WorldId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for WorldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Borrowed pieces of a world handed to a parallel stage.
pub(crate) struct StageParts<'w> {
    pub allocator: &'w mut EntityAllocator,
    pub storages: &'w mut HashMap<ComponentTypeId, Box<dyn AnyStorage>>,
    pub spawned: &'w mut Vec<Entity>,
    pub frame: u64,
    pub epoch: u64,
}

/// Entities, components, and pending structural changes for one scene.
///
/// Worlds are plain owned values: several may coexist (an editor preview and
/// a play session, say) as long as each is mutated by one writer at a time.
#[derive(Debug)]
pub struct World {
    id: WorldId,
    config: WorldConfig,
    allocator: EntityAllocator,
    registry: ComponentRegistry,
    storages: HashMap<ComponentTypeId, Box<dyn AnyStorage>>,
    /// Structural changes awaiting the next commit, in submission order.
    queue: Vec<QueuedChange>,
    /// Entities created since the last commit.
    spawned: Vec<Entity>,
    changes: ChangeLog,
    frame: u64,
    /// Number of commits so far.
    epoch: u64,
}

impl World {
    /// Create a new empty world with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create a new empty world.
    #[must_use]
    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            id: WorldId::new(),
            allocator: EntityAllocator::with_capacity(config.storage_capacity),
            registry: ComponentRegistry::new(),
            storages: HashMap::new(),
            queue: Vec::new(),
            spawned: Vec::new(),
            changes: ChangeLog::new(0),
            frame: 0,
            epoch: 0,
            config,
        }
    }

    /// This world's identity.
    #[must_use]
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// This world's configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Current frame number (0 before the first [`begin_frame`](Self::begin_frame)).
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Number of commits applied so far. Views and cached queries built
    /// under an older epoch are invalid.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    // -- Registration --

    /// Register component type `T`, creating its storage.
    ///
    /// Registering the same type twice is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if another Rust type already uses `T`'s component name.
    pub fn register<T: Component>(&mut self) -> ComponentTypeId {
        let type_id = T::component_type_id();
        if self.registry.register::<T>() {
            let mut storage: Box<dyn AnyStorage> =
                Box::new(ComponentStorage::<T>::with_capacity(self.config.storage_capacity));
            storage.set_tick(self.frame);
            self.storages.insert(type_id, storage);
            trace!(world = %self.id, component = T::type_name(), %type_id, "registered component");
        }
        type_id
    }

    /// Returns `true` if `T` is registered.
    #[must_use]
    pub fn is_registered<T: Component>(&self) -> bool {
        self.registry.contains(T::component_type_id())
    }

    /// The component registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    fn assert_registered(&self, component: ComponentTypeId, name: &str) {
        assert!(
            self.registry.contains(component),
            "component '{name}' used before registration with world '{}'",
            self.config.name
        );
    }

    // -- Entity lifecycle --

    /// Create a new entity. Takes effect immediately; the creation record
    /// is logged at the next commit.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.allocator.create();
        self.spawned.push(entity);
        entity
    }

    /// Returns `true` if `entity` is live.
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.allocator.is_valid(entity)
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.allocator.live_count()
    }

    /// Iterates live entities in index order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.allocator.iter()
    }

    // -- Queued structural changes --

    /// Queue destruction of `entity` and all its components.
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.enqueue(None, PendingChange::Destroy { entity });
    }

    /// Queue attaching `value` to `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.enqueue(None, PendingChange::add(entity, value));
    }

    /// Queue detaching `T` from `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.enqueue(None, PendingChange::remove::<T>(entity));
    }

    /// Queue every change in `commands`, in order.
    ///
    /// # Panics
    ///
    /// Panics if any change names an unregistered component type.
    pub fn submit(&mut self, commands: Commands) {
        for queued in commands.into_queued() {
            self.enqueue(queued.origin, queued.change);
        }
    }

    pub(crate) fn submit_change(&mut self, origin: Option<Arc<str>>, change: PendingChange) {
        self.enqueue(origin, change);
    }

    fn enqueue(&mut self, origin: Option<Arc<str>>, change: PendingChange) {
        if let PendingChange::Add { component, name, .. } | PendingChange::Remove { component, name, .. } =
            &change
        {
            self.assert_registered(*component, name);
        }
        self.queue.push(QueuedChange { origin, change });
    }

    /// Number of changes waiting for the next commit.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Apply every queued change in submission order.
    ///
    /// Each change is checked against the state at the moment it is applied,
    /// so an add queued after a remove of the same component succeeds, and
    /// anything queued for an entity destroyed earlier in the batch fails
    /// with [`EcsError::StaleHandle`]. Rejected changes are reported, never
    /// retried.
    pub fn commit(&mut self) -> CommitReport {
        let mut report = CommitReport::default();

        for entity in self.spawned.drain(..) {
            self.changes.push(entity, ChangeKind::Created, None);
        }

        for QueuedChange { origin, change } in std::mem::take(&mut self.queue) {
            let label = change.label();
            match self.apply(change) {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    debug!(
                        world = %self.id,
                        origin = origin.as_deref().unwrap_or("-"),
                        change = %label,
                        %error,
                        "structural change rejected"
                    );
                    report.failures.push(CommitFailure {
                        origin,
                        change: label,
                        error,
                    });
                }
            }
        }

        self.epoch += 1;
        if report.applied > 0 || !report.is_clean() {
            debug!(
                world = %self.id,
                frame = self.frame,
                epoch = self.epoch,
                applied = report.applied,
                failed = report.failures.len(),
                "committed structural changes"
            );
        }
        report
    }

    fn apply(&mut self, change: PendingChange) -> Result<(), EcsError> {
        let entity = change.entity();
        if !self.allocator.is_valid(entity) {
            return Err(EcsError::StaleHandle(entity));
        }

        match change {
            PendingChange::Destroy { .. } => {
                for info in self.registry.iter() {
                    if let Some(storage) = self.storages.get_mut(&info.type_id)
                        && storage.contains(entity)
                    {
                        storage.remove_entity(entity)?;
                        self.changes
                            .push(entity, ChangeKind::ComponentRemoved, Some(info.type_id));
                    }
                }
                self.allocator.destroy(entity)?;
                self.changes.push(entity, ChangeKind::Destroyed, None);
            }
            PendingChange::Add {
                component, payload, ..
            } => {
                self.storage_for_commit(component).insert_boxed(entity, payload)?;
                self.changes
                    .push(entity, ChangeKind::ComponentAdded, Some(component));
            }
            PendingChange::Remove { component, .. } => {
                self.storage_for_commit(component).remove_entity(entity)?;
                self.changes
                    .push(entity, ChangeKind::ComponentRemoved, Some(component));
            }
        }
        Ok(())
    }

    fn storage_for_commit(&mut self, component: ComponentTypeId) -> &mut Box<dyn AnyStorage> {
        match self.storages.get_mut(&component) {
            Some(storage) => storage,
            None => panic!("no storage for registered component {component}"),
        }
    }

    // -- Frame protocol --

    /// Start a new frame.
    ///
    /// Clears the previous frame's change log (its consumers have had their
    /// chance to drain it), advances the frame counter, then commits anything
    /// queued between frames. Records from that commit land in the new
    /// frame's log.
    pub fn begin_frame(&mut self) -> CommitReport {
        self.frame += 1;
        self.changes.reset(self.frame);
        for storage in self.storages.values_mut() {
            storage.set_tick(self.frame);
        }
        self.commit()
    }

    /// Finish the frame by committing everything systems queued.
    pub fn end_frame(&mut self) -> CommitReport {
        self.commit()
    }

    /// Structural changes committed so far this frame.
    #[must_use]
    pub fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    /// Take this frame's change log, leaving an empty one.
    pub fn drain_changes(&mut self) -> ChangeLog {
        std::mem::replace(&mut self.changes, ChangeLog::new(self.frame))
    }

    // -- Component access --

    /// `T`'s storage, if registered.
    #[must_use]
    pub fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        self.storages
            .get(&T::component_type_id())?
            .as_any()
            .downcast_ref::<ComponentStorage<T>>()
    }

    fn storage_mut<T: Component>(&mut self) -> Option<&mut ComponentStorage<T>> {
        self.storages
            .get_mut(&T::component_type_id())?
            .as_any_mut()
            .downcast_mut::<ComponentStorage<T>>()
    }

    /// The storage for `type_id`, type-erased.
    #[must_use]
    pub fn storage_dyn(&self, type_id: ComponentTypeId) -> Option<&dyn AnyStorage> {
        self.storages.get(&type_id).map(|s| &**s)
    }

    /// `entity`'s `T`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    /// `entity`'s `T`, mutably. Value writes are not structural and need no
    /// commit; the component is marked changed for this frame.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>()?.get_mut(entity)
    }

    /// Returns `true` if `entity` has a `T`.
    #[must_use]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.storage::<T>().is_some_and(|s| s.has(entity))
    }

    /// Every component type `entity` holds, in registration order.
    #[must_use]
    pub fn component_types_of(&self, entity: Entity) -> Vec<ComponentTypeId> {
        self.registry
            .iter()
            .filter(|info| {
                self.storages
                    .get(&info.type_id)
                    .is_some_and(|s| s.contains(entity))
            })
            .map(|info| info.type_id)
            .collect()
    }

    // -- Queries --

    /// Evaluate `descriptor` against the current storages.
    #[must_use]
    pub fn query(&self, descriptor: &QueryDescriptor) -> View<'_> {
        View::build(
            descriptor,
            |id| self.storage_dyn(id),
            self.frame,
            self.epoch,
        )
    }

    /// Call `f` with a mutable `T` for every entity matching `descriptor`.
    /// Returns the number of entities visited.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not in the descriptor's required set.
    pub fn for_each_mut<T, F>(&mut self, descriptor: &QueryDescriptor, mut f: F) -> usize
    where
        T: Component,
        F: FnMut(Entity, &mut T),
    {
        assert!(
            descriptor.required().contains(&T::component_type_id()),
            "for_each_mut::<{}> needs '{}' in the required set",
            std::any::type_name::<T>(),
            T::type_name()
        );
        let matches = self.query(descriptor).entities();
        let Some(storage) = self.storage_mut::<T>() else {
            return 0;
        };
        for &entity in &matches {
            if let Some(component) = storage.get_mut(entity) {
                f(entity, component);
            }
        }
        matches.len()
    }

    pub(crate) fn stage_parts(&mut self) -> StageParts<'_> {
        StageParts {
            allocator: &mut self.allocator,
            storages: &mut self.storages,
            spawned: &mut self.spawned,
            frame: self.frame,
            epoch: self.epoch,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::view::CachedQuery;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct A(u32);

    impl Component for A {
        fn type_name() -> &'static str {
            "A"
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct B(u32);

    impl Component for B {
        fn type_name() -> &'static str {
            "B"
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct C;

    impl Component for C {
        fn type_name() -> &'static str {
            "C"
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Transform {
        x: f32,
        y: f32,
    }

    impl Component for Transform {
        fn type_name() -> &'static str {
            "Transform"
        }
    }

    fn world() -> World {
        let mut world = World::new();
        world.register::<A>();
        world.register::<B>();
        world.register::<C>();
        world.register::<Transform>();
        world
    }

    fn sorted(mut v: Vec<Entity>) -> Vec<Entity> {
        v.sort();
        v
    }

    #[test]
    fn test_handle_valid_until_destroy_commits() {
        let mut world = world();
        let e = world.create_entity();
        assert!(world.is_valid(e));

        world.destroy_entity(e);
        assert!(world.is_valid(e), "destroy is deferred to commit");
        assert!(world.commit().is_clean());
        assert!(!world.is_valid(e));

        let reused = world.create_entity();
        assert_eq!(reused.index(), e.index());
        assert_ne!(reused, e);
        assert!(!world.is_valid(e));
    }

    #[test]
    fn test_add_then_get_returns_last_written() {
        let mut world = world();
        let e = world.create_entity();
        world.add_component(e, A(1));
        assert_eq!(world.get::<A>(e), None, "add is deferred to commit");
        world.commit();
        assert_eq!(world.get::<A>(e), Some(&A(1)));

        world.get_mut::<A>(e).unwrap().0 = 7;
        assert_eq!(world.get::<A>(e), Some(&A(7)));
        assert!(world.has::<A>(e));
        assert!(!world.has::<B>(e));
    }

    #[test]
    fn test_duplicate_and_missing_do_not_mutate() {
        let mut world = world();
        let e = world.create_entity();
        world.add_component(e, A(1));
        world.commit();

        world.add_component(e, A(2));
        world.remove_component::<B>(e);
        let report = world.commit();

        assert_eq!(report.applied, 0);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(
            report.failures[0].error,
            EcsError::DuplicateComponent {
                entity: e,
                component: "A"
            }
        );
        assert_eq!(
            report.failures[1].error,
            EcsError::MissingComponent {
                entity: e,
                component: "B"
            }
        );
        assert_eq!(world.get::<A>(e), Some(&A(1)));
        assert_eq!(world.storage::<A>().unwrap().len(), 1);
        assert!(world.storage::<B>().unwrap().is_empty());
    }

    #[test]
    fn test_resolution_uses_application_time_state() {
        let mut world = world();
        let e = world.create_entity();
        world.add_component(e, A(1));
        world.commit();

        // Remove then re-add in one batch: both apply.
        world.remove_component::<A>(e);
        world.add_component(e, A(2));
        // Two adds in one batch: the second is a duplicate.
        world.add_component(e, B(1));
        world.add_component(e, B(2));
        let report = world.commit();
        assert_eq!(report.applied, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(world.get::<A>(e), Some(&A(2)));
        assert_eq!(world.get::<B>(e), Some(&B(1)));

        // Anything after the destroy in the same batch hits a stale handle.
        world.destroy_entity(e);
        world.add_component(e, C);
        world.destroy_entity(e);
        let report = world.commit();
        assert_eq!(report.applied, 1);
        assert_eq!(
            report.failures.iter().map(|f| &f.error).collect::<Vec<_>>(),
            vec![&EcsError::StaleHandle(e), &EcsError::StaleHandle(e)]
        );
    }

    #[test]
    fn test_destroy_removes_all_components_and_excludes_from_queries() {
        let mut world = world();
        let e = world.create_entity();
        let other = world.create_entity();
        world.add_component(e, A(1));
        world.add_component(e, B(1));
        world.add_component(other, A(2));
        world.commit();

        world.destroy_entity(e);
        world.commit();

        assert!(world.component_types_of(e).is_empty());
        assert!(!world.has::<A>(e));
        assert!(!world.has::<B>(e));
        assert_eq!(
            world.query(&QueryDescriptor::new().with::<A>()).entities(),
            vec![other]
        );
        assert!(world.query(&QueryDescriptor::new().with::<B>()).is_empty());
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn test_exclusion_query_stable_across_unrelated_add() {
        let mut world = world();
        let e1 = world.create_entity();
        let e2 = world.create_entity();
        let e3 = world.create_entity();
        world.add_component(e1, A(1));
        world.add_component(e2, A(2));
        world.add_component(e2, B(2));
        world.add_component(e3, A(3));
        world.commit();

        let query = QueryDescriptor::new().with::<A>().without::<B>();
        assert_eq!(sorted(world.query(&query).entities()), vec![e1, e3]);

        world.add_component(e2, C);
        world.commit();
        assert_eq!(sorted(world.query(&query).entities()), vec![e1, e3]);
    }

    #[test]
    fn test_change_log_for_frame() {
        let mut world = world();
        let e1 = world.create_entity();
        let e2 = world.create_entity();
        world.add_component(e2, A(2));
        world.add_component(e2, B(2));
        world.begin_frame();
        world.end_frame();

        world.begin_frame();
        let e4 = world.create_entity();
        world.add_component(e4, Transform { x: 0.0, y: 0.0 });
        world.destroy_entity(e2);
        assert!(world.end_frame().is_clean());

        let log = world.changes();
        assert_eq!(log.frame(), 2);
        assert_eq!(log.created().collect::<Vec<_>>(), vec![e4]);
        assert_eq!(log.destroyed().collect::<Vec<_>>(), vec![e2]);
        let added: Vec<_> = log.of_kind(ChangeKind::ComponentAdded).collect();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].entity, e4);
        assert_eq!(added[0].component, Some(Transform::component_type_id()));
        let removed: Vec<_> = log
            .of_kind(ChangeKind::ComponentRemoved)
            .map(|r| (r.entity, r.component))
            .collect();
        assert_eq!(
            removed,
            vec![
                (e2, Some(A::component_type_id())),
                (e2, Some(B::component_type_id()))
            ]
        );
        assert_eq!(log.len(), 5);
        assert!(log.iter().all(|r| r.entity != e1));
    }

    #[test]
    fn test_begin_frame_clears_log_and_applies_leftovers() {
        let mut world = world();
        let e = world.create_entity();
        world.end_frame();
        assert_eq!(world.changes().len(), 1);

        world.add_component(e, A(5));
        let report = world.begin_frame();
        assert_eq!(report.applied, 1);
        assert_eq!(world.frame(), 1);
        let records = world.changes().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ChangeKind::ComponentAdded);

        let drained = world.drain_changes();
        assert_eq!(drained.len(), 1);
        assert!(world.changes().is_empty());
    }

    #[test]
    fn test_commands_queued_during_iteration() {
        let mut world = world();
        let entities: Vec<_> = (0..4).map(|_| world.create_entity()).collect();
        for (i, &e) in entities.iter().enumerate() {
            world.add_component(e, A(i as u32));
        }
        world.commit();

        let mut commands = Commands::with_origin("cleanup");
        let view = world.query(&QueryDescriptor::new().with::<A>());
        for (e, a) in view.components::<A>() {
            if a.0 % 2 == 0 {
                commands.destroy_entity(e);
            }
        }
        // Iterating again over the same view sees the same entities.
        assert_eq!(view.iter().count(), 4);
        world.submit(commands);
        assert_eq!(world.pending_count(), 2);
        world.commit();

        assert_eq!(
            sorted(world.query(&QueryDescriptor::new().with::<A>()).entities()),
            vec![entities[1], entities[3]]
        );
    }

    #[test]
    fn test_failures_carry_origin() {
        let mut world = world();
        let ghost = Entity::new(42, 0);
        let mut commands = Commands::with_origin("script");
        commands.destroy_entity(ghost);
        world.submit(commands);
        let report = world.commit();
        assert_eq!(report.failures_from("script").count(), 1);
        assert_eq!(report.failures[0].change.entity(), ghost);
    }

    #[test]
    fn test_changed_filter() {
        let mut world = world();
        let a = world.create_entity();
        let b = world.create_entity();
        world.add_component(a, A(0));
        world.add_component(b, A(0));
        world.begin_frame();
        let changed = QueryDescriptor::new().changed::<A>();
        assert_eq!(world.query(&changed).entities().len(), 2, "adds count as changes");

        world.begin_frame();
        assert!(world.query(&changed).is_empty());
        world.get_mut::<A>(b).unwrap().0 = 1;
        assert_eq!(world.query(&changed).entities(), vec![b]);
    }

    #[test]
    fn test_for_each_mut() {
        let mut world = world();
        let a = world.create_entity();
        let b = world.create_entity();
        world.add_component(a, A(1));
        world.add_component(b, A(2));
        world.add_component(b, B(0));
        world.commit();

        let visited = world.for_each_mut::<A, _>(&QueryDescriptor::new().with::<A>().without::<B>(), |_, a| {
            a.0 *= 10;
        });
        assert_eq!(visited, 1);
        assert_eq!(world.get::<A>(a), Some(&A(10)));
        assert_eq!(world.get::<A>(b), Some(&A(2)));
    }

    #[test]
    fn test_query_drives_from_smallest_storage() {
        let mut world = world();
        let mut with_both = Vec::new();
        for i in 0..10 {
            let e = world.create_entity();
            world.add_component(e, A(i));
            if i % 5 == 0 {
                world.add_component(e, B(i));
                with_both.push(e);
            }
        }
        world.commit();

        let view = world.query(&QueryDescriptor::new().with::<A>().with::<B>());
        assert_eq!(view.len_hint(), 2);
        assert_eq!(sorted(view.entities()), with_both);
        assert_eq!(view.get::<B>(with_both[1]), Some(&B(5)));
    }

    #[test]
    fn test_unregistered_required_type_yields_empty_view() {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        struct Unknown;
        impl Component for Unknown {
            fn type_name() -> &'static str {
                "Unknown"
            }
        }

        let mut world = world();
        let e = world.create_entity();
        world.add_component(e, A(0));
        world.commit();
        assert!(world.query(&QueryDescriptor::new().with::<Unknown>()).is_empty());
        assert_eq!(
            world
                .query(&QueryDescriptor::new().with::<A>().without::<Unknown>())
                .entities(),
            vec![e]
        );
        assert_eq!(world.get::<Unknown>(e).map(|_| ()), None);
    }

    #[test]
    #[should_panic(expected = "used before registration")]
    fn test_unregistered_add_is_contract_violation() {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        struct Unknown;
        impl Component for Unknown {
            fn type_name() -> &'static str {
                "Unknown"
            }
        }

        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Unknown);
    }

    #[test]
    fn test_cached_query_refresh() {
        let mut world = world();
        let e = world.create_entity();
        world.add_component(e, A(0));
        world.commit();

        let mut cache = CachedQuery::new(QueryDescriptor::new().with::<A>());
        assert_eq!(cache.refresh(&world), &[e]);
        assert_eq!(cache.entities(&world), &[e]);

        let f = world.create_entity();
        world.add_component(f, A(1));
        world.commit();
        assert!(cache.is_stale(&world));
        assert_eq!(cache.refresh(&world).len(), 2);
    }

    #[test]
    #[should_panic(expected = "cached query used after a commit")]
    fn test_cached_query_stale_use_panics() {
        let mut world = world();
        let mut cache = CachedQuery::new(QueryDescriptor::new().with::<A>());
        cache.refresh(&world);
        world.commit();
        let _ = cache.entities(&world);
    }

    #[test]
    fn test_worlds_are_independent() {
        let mut editor = World::with_config(WorldConfig::new("editor"));
        let mut play = World::with_config(WorldConfig::new("play"));
        editor.register::<A>();
        play.register::<A>();

        let e = editor.create_entity();
        editor.add_component(e, A(1));
        editor.commit();

        assert_ne!(editor.id(), play.id());
        assert!(!play.is_valid(e));
        assert!(play.get::<A>(e).is_none());
        assert_eq!(play.entity_count(), 0);
        assert_eq!(editor.config().name, "editor");
    }
}
