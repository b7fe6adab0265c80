//! Configuration types.

use std::time::Duration;

/// Worker loop configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Stable identity of this worker process (attribution, stuck-task diagnostics).
    pub worker_id: String,
    /// How long to sleep between polls when no work is available.
    pub poll_interval: Duration,
    /// Upper bound on simultaneously in-flight tasks for this process.
    pub max_concurrent_tasks: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: default_worker_id(),
            poll_interval: Duration::from_secs(5),
            max_concurrent_tasks: 5,
        }
    }
}

impl WorkerConfig {
    /// Build from environment variables, falling back to defaults.
    ///
    /// `WORKER_ID`, `POLL_INTERVAL` (seconds), `MAX_CONCURRENT_TASKS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_id: std::env::var("WORKER_ID").unwrap_or(defaults.worker_id),
            poll_interval: env_secs("POLL_INTERVAL")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            max_concurrent_tasks: std::env::var("MAX_CONCURRENT_TASKS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_concurrent_tasks),
        }
    }
}

/// Stuck-task reaper configuration.
#[derive(Debug, Clone, Copy)]
pub struct ReaperConfig {
    /// How often the reaper sweeps for stale tasks.
    pub interval: Duration,
    /// A `processing` task unmodified for longer than this is considered stuck.
    /// Must be conservative relative to realistic executor durations: a slow
    /// (not dead) worker reclaimed here produces a second concurrent attempt.
    pub stale_threshold: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            stale_threshold: Duration::from_secs(600),
        }
    }
}

impl ReaperConfig {
    /// Build from `REAPER_INTERVAL` / `STALE_TASK_TIMEOUT` (seconds).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: env_secs("REAPER_INTERVAL")
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            stale_threshold: env_secs("STALE_TASK_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_threshold),
        }
    }
}

fn env_secs(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn default_worker_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "local".to_string());
    format!("worker-{}-{}", host, std::process::id())
}
