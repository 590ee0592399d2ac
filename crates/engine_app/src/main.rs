//! # engine_app — demo host
//!
//! Runs a small scene on the ECS runtime: a spawner fans projectiles out from
//! the origin, movement integrates them, lifetimes expire them, and logging
//! renderer/physics backends follow along through the change log.
//!
//! ## Startup Sequence
//!
//! 1. Read [`AppConfig`](config::AppConfig) from the environment.
//! 2. Register components and optionally load `ENGINE_SCENE`.
//! 3. Resolve sync backends against the host's capabilities.
//! 4. Enter the fixed-timestep tick loop.
//! 5. Optionally save the final scene to `ENGINE_SAVE`.

mod backends;
mod components;
mod config;
mod systems;
mod tick;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine_ecs::{
    Capability, CapabilitySet, SceneSnapshot, Schedule, ScheduleConfig, SyncBackend, SyncRegistry,
    World, WorldConfig,
};

use backends::{LogPhysics, LogRenderer};
use config::AppConfig;
use systems::Spawner;
use tick::{TickConfig, TickLoop};

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let config = AppConfig::from_env()?;
    info!(?config, "engine host starting");

    let mut world = World::with_config(WorldConfig::new("play").with_storage_capacity(256));
    components::register_all(&mut world);

    if let Some(path) = &config.scene_path {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scene {}", path.display()))?;
        let snapshot = SceneSnapshot::from_json(&text)?;
        let loaded = world.load_snapshot(&snapshot)?;
        info!(path = %path.display(), entities = loaded.len(), "scene loaded");
    }

    let mut schedule =
        Schedule::new(ScheduleConfig::default().with_worker_threads(config.worker_threads))?;
    schedule.add_system(Spawner::new(0.25, 3.0))?;
    schedule.add_system(systems::movement())?;
    schedule.add_system(systems::lifetime())?;

    let available = CapabilitySet::empty()
        .with(Capability::Rendering)
        .with(Capability::Physics);
    let candidates: Vec<Box<dyn SyncBackend>> =
        vec![Box::new(LogRenderer::default()), Box::new(LogPhysics::default())];
    let backends = SyncRegistry::resolve(available, candidates);

    let mut tick_loop = TickLoop::new(
        TickConfig {
            tick_rate: config.tick_rate,
            max_ticks: config.max_ticks,
        },
        world,
        schedule,
        backends,
    );
    tick_loop.run();

    if let Some(path) = &config.save_path {
        let snapshot = tick_loop.world().snapshot()?;
        std::fs::write(path, snapshot.to_json()?)
            .with_context(|| format!("writing scene {}", path.display()))?;
        info!(path = %path.display(), entities = snapshot.entities.len(), "scene saved");
    }

    info!(ticks = tick_loop.tick_id(), "engine host shut down");
    Ok(())
}
