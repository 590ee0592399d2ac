//! # engine_ecs
//!
//! The runtime half of the ECS: the [`World`] that owns entities and their
//! storages, the deferred structural-change pipeline, query evaluation, and
//! the boundaries to schedulers, scripts, persistence, and engine backends.
//!
//! Frame protocol:
//!
//! 1. [`World::begin_frame`] clears the last frame's [`ChangeLog`] and commits
//!    anything queued between frames.
//! 2. Systems run (directly or through a [`Schedule`]), reading [`View`]s,
//!    writing component values in place, and queueing structural changes.
//! 3. [`World::end_frame`] commits the queue; the resulting [`ChangeLog`] is
//!    what renderer and physics sync consume.

pub mod bridge;
pub mod change;
pub mod command;
pub mod config;
pub mod registry;
pub mod schedule;
pub mod snapshot;
pub mod sync;
pub mod view;
pub mod world;

pub use bridge::{BridgeError, ScriptBridge};
pub use change::{ChangeKind, ChangeLog, ChangeRecord};
pub use command::{ChangeLabel, Commands, CommitFailure, CommitReport, PendingChange, QueuedChange};
pub use config::{ScheduleConfig, WorldConfig};
pub use registry::{ComponentInfo, ComponentRegistry};
pub use schedule::{
    FnSystem, RegisteredSystem, Schedule, ScheduleError, Stage, System, SystemContext,
    compute_stages, system_fn,
};
pub use snapshot::{ComponentEntry, EntityRecord, SNAPSHOT_VERSION, SceneSnapshot, SnapshotError};
pub use sync::{Capability, CapabilitySet, SyncBackend, SyncError, SyncRegistry};
pub use view::{CachedQuery, View, ViewIter};
pub use world::{World, WorldId};

pub use engine_component::{
    Access, AnyStorage, AssetId, Component, ComponentStorage, ComponentTypeId, EcsError, Entity,
    QueryDescriptor,
};
