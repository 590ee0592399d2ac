//! World and schedule configuration.

/// Configuration for a [`World`](crate::World).
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Human-readable world name (e.g. `"play"`, `"editor-preview"`).
    pub name: String,
    /// Initial capacity reserved in each component storage and the handle
    /// allocator.
    pub storage_capacity: usize,
}

impl WorldConfig {
    /// Create a config with the given world name and default capacity.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Override the initial storage capacity.
    #[must_use]
    pub fn with_storage_capacity(mut self, capacity: usize) -> Self {
        self.storage_capacity = capacity;
        self
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "world".to_string(),
            storage_capacity: 0,
        }
    }
}

/// Configuration for a [`Schedule`](crate::Schedule).
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Worker threads for parallel stages (0 = rayon's global pool).
    pub worker_threads: usize,
    /// Commit queued structural changes after every stage. When `false`, the
    /// queue is left for the caller's end-of-frame commit.
    pub commit_between_stages: bool,
}

impl ScheduleConfig {
    /// Use a dedicated pool with `threads` workers.
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Toggle the per-stage commit.
    #[must_use]
    pub fn with_commit_between_stages(mut self, commit: bool) -> Self {
        self.commit_between_stages = commit;
        self
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            commit_between_stages: true,
        }
    }
}
