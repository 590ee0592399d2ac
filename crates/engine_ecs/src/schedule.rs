//! System scheduler: conflict detection, stage computation, and execution.
//!
//! Each system declares an [`Access`] set up front. The scheduler groups
//! systems into **stages**: systems within a stage have no conflicting access
//! and run in parallel on a rayon pool. Stages execute in order, with a merge
//! barrier between them where queued structural changes are submitted in
//! registration order and committed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use engine_component::{
    Access, AnyStorage, Component, ComponentStorage, ComponentTypeId, Entity, EntityAllocator,
    QueryDescriptor,
};

use crate::command::{CommitFailure, CommitReport, Commands};
use crate::config::ScheduleConfig;
use crate::view::View;
use crate::world::World;

/// Errors produced while building or extending a [`Schedule`].
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The dedicated worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// A system with the same name is already scheduled.
    #[error("system '{0}' is already scheduled")]
    DuplicateSystem(String),
}

/// A unit of per-frame behaviour.
pub trait System: Send {
    /// Unique name, reported as the origin of this system's queued changes.
    fn name(&self) -> &str;

    /// Component types this system reads and writes. Queried once, when the
    /// system is added to a [`Schedule`].
    fn access(&self) -> Access;

    /// Run once per frame.
    fn run(&mut self, ctx: &mut SystemContext<'_>);

    /// Receives the changes this system queued that the following commit
    /// rejected. Ignored by default.
    fn on_commit_failures(&mut self, failures: &[CommitFailure]) {
        let _ = failures;
    }
}

/// A [`System`] built from a closure.
pub struct FnSystem<F> {
    name: String,
    access: Access,
    f: F,
}

/// Wrap `f` as a system named `name` with the given access.
#[must_use]
pub fn system_fn<F>(name: impl Into<String>, access: Access, f: F) -> FnSystem<F>
where
    F: FnMut(&mut SystemContext<'_>) + Send,
{
    FnSystem {
        name: name.into(),
        access,
        f,
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut SystemContext<'_>) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn access(&self) -> Access {
        self.access.clone()
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) {
        (self.f)(ctx);
    }
}

/// A scheduled system with its name and declared access.
pub struct RegisteredSystem {
    /// The system name (e.g. `"physics"`).
    pub name: Arc<str>,
    /// The system's data access requirements.
    pub access: Access,
    system: Box<dyn System>,
}

impl std::fmt::Debug for RegisteredSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSystem")
            .field("name", &self.name)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

/// A stage is a group of systems that can run in parallel (no conflicts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Indices into the schedule's system list, ascending.
    pub system_indices: Vec<usize>,
}

/// Computes execution stages from the systems' access sets, in registration
/// order.
///
/// Greedy colouring: each system goes into the first stage after the last
/// stage holding a system it conflicts with. Conflicting systems therefore
/// always run in registration order, and non-conflicting ones are pulled as
/// early as possible.
#[must_use]
pub fn compute_stages(accesses: &[Access]) -> Vec<Stage> {
    let mut stages: Vec<Stage> = Vec::new();

    for (sys_idx, access) in accesses.iter().enumerate() {
        let earliest = stages
            .iter()
            .rposition(|stage| {
                stage
                    .system_indices
                    .iter()
                    .any(|&existing| access.conflicts_with(&accesses[existing]))
            })
            .map_or(0, |last_conflict| last_conflict + 1);

        match stages.get_mut(earliest) {
            Some(stage) => stage.system_indices.push(sys_idx),
            None => stages.push(Stage {
                system_indices: vec![sys_idx],
            }),
        }
    }

    stages
}

/// Ordered set of systems run against a [`World`] each frame.
pub struct Schedule {
    config: ScheduleConfig,
    systems: Vec<RegisteredSystem>,
    /// Pre-computed stages (recomputed when the system set changes).
    stages: Vec<Stage>,
    stages_dirty: bool,
    /// Dedicated pool, or `None` for rayon's global pool.
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule")
            .field("config", &self.config)
            .field("systems", &self.systems)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

impl Schedule {
    /// Create an empty schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Pool`] if a dedicated worker pool was
    /// requested and could not be built.
    pub fn new(config: ScheduleConfig) -> Result<Self, ScheduleError> {
        let pool = if config.worker_threads > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.worker_threads)
                    .thread_name(|i| format!("ecs-worker-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        Ok(Self {
            config,
            systems: Vec::new(),
            stages: Vec::new(),
            stages_dirty: true,
            pool,
        })
    }

    /// Append a system. Systems run in the order added unless their access
    /// sets let them share a stage.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::DuplicateSystem`] if the name is taken.
    pub fn add_system(&mut self, system: impl System + 'static) -> Result<(), ScheduleError> {
        let name: Arc<str> = system.name().into();
        if self.systems.iter().any(|s| s.name == name) {
            return Err(ScheduleError::DuplicateSystem(name.to_string()));
        }
        self.systems.push(RegisteredSystem {
            name,
            access: system.access(),
            system: Box::new(system),
        });
        self.stages_dirty = true;
        Ok(())
    }

    /// Scheduled systems, in registration order.
    #[must_use]
    pub fn systems(&self) -> &[RegisteredSystem] {
        &self.systems
    }

    fn recompute_stages(&mut self) {
        let accesses: Vec<Access> = self.systems.iter().map(|s| s.access.clone()).collect();
        self.stages = compute_stages(&accesses);
        self.stages_dirty = false;

        info!(
            stage_count = self.stages.len(),
            system_count = self.systems.len(),
            "recomputed execution stages"
        );
    }

    /// Returns the current execution stages, recomputing if necessary.
    pub fn stages(&mut self) -> &[Stage] {
        if self.stages_dirty {
            self.recompute_stages();
        }
        &self.stages
    }

    /// Run every system once against `world`.
    ///
    /// Returns the merged report of the per-stage commits. When
    /// `commit_between_stages` is off, changes stay queued for the caller's
    /// [`World::end_frame`] and the report is empty.
    pub fn run(&mut self, world: &mut World, dt: f64) -> CommitReport {
        if self.stages_dirty {
            self.recompute_stages();
        }

        let mut report = CommitReport::default();
        for stage_idx in 0..self.stages.len() {
            let stage = self.stages[stage_idx].clone();
            debug!(
                frame = world.frame(),
                stage = stage_idx,
                systems = stage.system_indices.len(),
                "executing stage"
            );

            for commands in self.run_stage(world, &stage, dt) {
                world.submit(commands);
            }

            if self.config.commit_between_stages {
                let stage_report = world.commit();
                self.dispatch_failures(&stage, &stage_report);
                report.merge(stage_report);
            }
        }
        report
    }

    /// Run one stage's systems in parallel and return their command buffers
    /// in registration order.
    fn run_stage(&mut self, world: &mut World, stage: &Stage, dt: f64) -> Vec<Commands> {
        let parts = world.stage_parts();
        let allocator = Mutex::new(&mut *parts.allocator);

        let members: Vec<&mut RegisteredSystem> = self
            .systems
            .iter_mut()
            .enumerate()
            .filter(|(idx, _)| stage.system_indices.contains(idx))
            .map(|(_, system)| system)
            .collect();

        let mut reads: Vec<HashMap<ComponentTypeId, &dyn AnyStorage>> =
            vec![HashMap::new(); members.len()];
        let mut writes: Vec<HashMap<ComponentTypeId, &mut Box<dyn AnyStorage>>> =
            (0..members.len()).map(|_| HashMap::new()).collect();

        // Within a stage a storage is either written by exactly one system or
        // only read.
        for (&type_id, storage) in parts.storages.iter_mut() {
            if let Some(writer) = members.iter().position(|m| m.access.can_write(type_id)) {
                writes[writer].insert(type_id, storage);
            } else {
                let shared: &dyn AnyStorage = &**storage;
                for (pos, member) in members.iter().enumerate() {
                    if member.access.can_read(type_id) {
                        reads[pos].insert(type_id, shared);
                    }
                }
            }
        }

        let mut jobs: Vec<(&mut RegisteredSystem, SystemContext<'_>)> = members
            .into_iter()
            .zip(reads.into_iter().zip(writes))
            .map(|(member, (reads, writes))| {
                let ctx = SystemContext {
                    name: Arc::clone(&member.name),
                    access: member.access.clone(),
                    frame: parts.frame,
                    epoch: parts.epoch,
                    dt,
                    reads,
                    writes,
                    allocator: &allocator,
                    spawned: Vec::new(),
                    commands: Commands::with_origin(Arc::clone(&member.name)),
                };
                (member, ctx)
            })
            .collect();

        match &self.pool {
            Some(pool) => pool.install(|| run_parallel(&mut jobs)),
            None => run_parallel(&mut jobs),
        }

        let mut buffers = Vec::with_capacity(jobs.len());
        for (_, ctx) in jobs {
            parts.spawned.extend(ctx.spawned);
            buffers.push(ctx.commands);
        }
        buffers
    }

    fn dispatch_failures(&mut self, stage: &Stage, report: &CommitReport) {
        if report.is_clean() {
            return;
        }
        for &idx in &stage.system_indices {
            let member = &mut self.systems[idx];
            let failures: Vec<CommitFailure> = report.failures_from(&member.name).cloned().collect();
            if !failures.is_empty() {
                member.system.on_commit_failures(&failures);
            }
        }
    }
}

fn run_parallel(jobs: &mut [(&mut RegisteredSystem, SystemContext<'_>)]) {
    jobs.par_iter_mut()
        .for_each(|(member, ctx)| member.system.run(ctx));
}

/// A system's window onto the world for one run.
///
/// Holds shared borrows of the storages the system reads and the unique
/// borrow of the storages it writes. Touching a type outside the declared
/// [`Access`] panics. Structural changes go through [`commands`](Self::commands)
/// and apply at the next commit; entity creation is immediate.
pub struct SystemContext<'s> {
    name: Arc<str>,
    access: Access,
    frame: u64,
    epoch: u64,
    dt: f64,
    reads: HashMap<ComponentTypeId, &'s dyn AnyStorage>,
    writes: HashMap<ComponentTypeId, &'s mut Box<dyn AnyStorage>>,
    allocator: &'s Mutex<&'s mut EntityAllocator>,
    spawned: Vec<Entity>,
    commands: Commands,
}

impl std::fmt::Debug for SystemContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemContext")
            .field("name", &self.name)
            .field("frame", &self.frame)
            .field("dt", &self.dt)
            .field("queued", &self.commands.len())
            .finish_non_exhaustive()
    }
}

impl<'s> SystemContext<'s> {
    /// Name of the running system.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current frame number.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Seconds since the previous frame.
    #[must_use]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    fn with_allocator<R>(&self, f: impl FnOnce(&mut EntityAllocator) -> R) -> R {
        let mut guard = self.allocator.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Create a new entity. The handle is valid immediately.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.with_allocator(|allocator| allocator.create());
        self.spawned.push(entity);
        entity
    }

    /// Returns `true` if `entity` is live.
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.with_allocator(|allocator| allocator.is_valid(entity))
    }

    fn assert_readable(&self, type_id: ComponentTypeId, what: &str) {
        assert!(
            self.access.can_read(type_id),
            "system '{}' {what} component {type_id} without declaring read access",
            self.name
        );
    }

    fn assert_writable(&self, type_id: ComponentTypeId, what: &str) {
        assert!(
            self.access.can_write(type_id),
            "system '{}' {what} component {type_id} without declaring write access",
            self.name
        );
    }

    fn lookup(&self, type_id: ComponentTypeId) -> Option<&dyn AnyStorage> {
        match self.writes.get(&type_id) {
            Some(storage) => Some(&***storage),
            None => self.reads.get(&type_id).copied(),
        }
    }

    fn typed_mut<T: Component>(&mut self) -> Option<&mut ComponentStorage<T>> {
        self.writes
            .get_mut(&T::component_type_id())?
            .as_any_mut()
            .downcast_mut::<ComponentStorage<T>>()
    }

    /// `entity`'s `T`.
    ///
    /// # Panics
    ///
    /// Panics if the system did not declare read or write access to `T`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let type_id = T::component_type_id();
        self.assert_readable(type_id, "read");
        self.lookup(type_id)?
            .as_any()
            .downcast_ref::<ComponentStorage<T>>()?
            .get(entity)
    }

    /// `entity`'s `T`, mutably.
    ///
    /// # Panics
    ///
    /// Panics if the system did not declare write access to `T`.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.assert_writable(T::component_type_id(), "wrote");
        self.typed_mut::<T>()?.get_mut(entity)
    }

    /// Evaluate `descriptor` against the storages this system may read.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor references a type outside the declared access.
    #[must_use]
    pub fn query(&self, descriptor: &QueryDescriptor) -> View<'_> {
        for type_id in descriptor.referenced_types() {
            self.assert_readable(type_id, "queried");
        }
        View::build(descriptor, |id| self.lookup(id), self.frame, self.epoch)
    }

    /// Call `f` with a mutable `T` for every entity matching `descriptor`.
    /// Returns the number of entities visited.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not required by the descriptor or not declared
    /// writable, or if the descriptor references an undeclared type.
    pub fn for_each_mut<T, F>(&mut self, descriptor: &QueryDescriptor, mut f: F) -> usize
    where
        T: Component,
        F: FnMut(Entity, &mut T),
    {
        let type_id = T::component_type_id();
        assert!(
            descriptor.required().contains(&type_id),
            "for_each_mut::<{}> needs '{}' in the required set",
            std::any::type_name::<T>(),
            T::type_name()
        );
        self.assert_writable(type_id, "wrote");

        let matches = self.query(descriptor).entities();
        let Some(storage) = self.typed_mut::<T>() else {
            return 0;
        };
        for &entity in &matches {
            if let Some(component) = storage.get_mut(entity) {
                f(entity, component);
            }
        }
        matches.len()
    }

    /// This system's structural change buffer.
    pub fn commands(&mut self) -> &mut Commands {
        &mut self.commands
    }

    /// Queue destruction of `entity`.
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.commands.destroy_entity(entity);
    }

    /// Queue attaching `value` to `entity`.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.commands.add_component(entity, value);
    }

    /// Queue detaching `T` from `entity`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.commands.remove_component::<T>(entity);
    }
}
