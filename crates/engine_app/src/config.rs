//! Host configuration, read from the environment.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Target ticks per second.
pub const TICK_RATE_ENV: &str = "ENGINE_TICK_RATE";
/// Number of ticks to run before exiting (0 = unlimited).
pub const MAX_TICKS_ENV: &str = "ENGINE_MAX_TICKS";
/// Worker threads for parallel system stages (0 = rayon default).
pub const WORKERS_ENV: &str = "ENGINE_WORKERS";
/// Scene file loaded at startup.
pub const SCENE_ENV: &str = "ENGINE_SCENE";
/// Scene file written on shutdown.
pub const SAVE_ENV: &str = "ENGINE_SAVE";

/// Configuration for the demo host.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// Worker threads for parallel stages (0 = rayon's global pool).
    pub worker_threads: usize,
    /// JSON scene to load before the first tick.
    pub scene_path: Option<PathBuf>,
    /// Where to write a JSON scene after the last tick.
    pub save_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 600,
            worker_threads: 0,
            scene_path: None,
            save_path: None,
        }
    }
}

impl AppConfig {
    /// Read the configuration from the process environment, falling back to
    /// defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a present value does not parse or the tick rate is
    /// not positive.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            tick_rate: parse(&lookup, TICK_RATE_ENV)?.unwrap_or(defaults.tick_rate),
            max_ticks: parse(&lookup, MAX_TICKS_ENV)?.unwrap_or(defaults.max_ticks),
            worker_threads: parse(&lookup, WORKERS_ENV)?.unwrap_or(defaults.worker_threads),
            scene_path: lookup(SCENE_ENV).map(PathBuf::from),
            save_path: lookup(SAVE_ENV).map(PathBuf::from),
        };
        anyhow::ensure!(
            config.tick_rate.is_finite() && config.tick_rate > 0.0,
            "{TICK_RATE_ENV} must be a positive number, got {}",
            config.tick_rate
        );
        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid {key}={raw:?}"))
        })
        .transpose()
}
