//! Fixed-timestep frame loop.
//!
//! Each tick runs the frame protocol end to end:
//!
//! 1. Begin the frame (commit leftovers, reset the change log).
//! 2. Run the system schedule, committing between stages.
//! 3. End the frame (commit whatever is still queued).
//! 4. Feed the frame's change log to the sync backends.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use engine_ecs::{CommitReport, Schedule, SyncRegistry, World};

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

/// The host's tick loop state.
#[derive(Debug)]
pub struct TickLoop {
    /// Current tick counter.
    tick_id: u64,
    config: TickConfig,
    world: World,
    schedule: Schedule,
    backends: SyncRegistry,
}

impl TickLoop {
    /// Create a tick loop over a prepared world, schedule, and backend set.
    #[must_use]
    pub fn new(config: TickConfig, world: World, schedule: Schedule, backends: SyncRegistry) -> Self {
        Self {
            tick_id: 0,
            config,
            world,
            schedule,
            backends,
        }
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Returns a reference to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Run one tick.
    pub fn tick(&mut self, dt: f64) -> CommitReport {
        self.tick_id += 1;

        let mut report = self.world.begin_frame();
        report.merge(self.schedule.run(&mut self.world, dt));
        report.merge(self.world.end_frame());

        let sync_errors = self.backends.sync_all(&mut self.world);

        debug!(
            tick_id = self.tick_id,
            dt,
            entities = self.world.entity_count(),
            applied = report.applied,
            rejected = report.failures.len(),
            sync_errors = sync_errors.len(),
            "tick complete"
        );
        report
    }

    /// Run the tick loop for the configured number of ticks, or indefinitely.
    pub fn run(&mut self) {
        let tick_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick(tick_duration.as_secs_f64());

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, entities = self.world.entity_count(), "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use engine_ecs::ScheduleConfig;

    use super::*;
    use crate::backends::{LogPhysics, LogRenderer};
    use crate::components::register_all;
    use crate::systems::{Spawner, lifetime, movement};

    fn demo_loop(config: TickConfig) -> TickLoop {
        let mut world = World::new();
        register_all(&mut world);
        let mut schedule = Schedule::new(ScheduleConfig::default()).unwrap();
        schedule.add_system(Spawner::new(0.1, 0.35)).unwrap();
        schedule.add_system(movement()).unwrap();
        schedule.add_system(lifetime()).unwrap();
        let mut backends = SyncRegistry::new();
        backends.register(Box::new(LogRenderer::default()));
        backends.register(Box::new(LogPhysics::default()));
        TickLoop::new(config, world, schedule, backends)
    }

    #[test]
    fn test_tick_advances_counter() {
        let mut tick_loop = demo_loop(TickConfig::default());
        assert_eq!(tick_loop.tick_id(), 0);
        tick_loop.tick(1.0 / 60.0);
        assert_eq!(tick_loop.tick_id(), 1);
        assert_eq!(tick_loop.world().frame(), 1);
    }

    #[test]
    fn test_population_reaches_steady_state() {
        let mut tick_loop = demo_loop(TickConfig::default());
        for _ in 0..20 {
            assert!(tick_loop.tick(0.1).is_clean());
        }
        // One spawn per tick, each living four ticks.
        let alive = tick_loop.world().entity_count();
        assert!((3..=4).contains(&alive), "alive = {alive}");
        assert!(tick_loop.world().changes().is_empty(), "backends drained the log");
    }

    #[test]
    fn test_run_limited_ticks() {
        let mut tick_loop = demo_loop(TickConfig {
            tick_rate: 1000.0,
            max_ticks: 5,
        });
        tick_loop.run();
        assert_eq!(tick_loop.tick_id(), 5);
    }
}
