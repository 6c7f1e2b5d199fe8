use serde::{Deserialize, Serialize};

/// Limits and policies of the download scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub download_enabled: bool,

    /// Maximum number of transfers in flight.
    #[serde(default = "default_active_jobs_limit")]
    pub active_jobs_limit: usize,

    /// Capacity of the LIFO primary queue.
    #[serde(default = "default_queue_limit")]
    pub queue_limit: usize,

    /// Capacity of the FIFO waiting backlog behind the primary queue.
    #[serde(default = "default_waiting_limit")]
    pub waiting_limit: usize,

    /// Failed transfers are retried this many times before blacklisting.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Queued or waiting jobs older than this are dropped by `requeue`.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Base for relative submissions.
    #[serde(default)]
    pub server_url: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_active_jobs_limit() -> usize {
    5
}

fn default_queue_limit() -> usize {
    1000
}

fn default_waiting_limit() -> usize {
    1000
}

fn default_retry_limit() -> u32 {
    3
}

fn default_stale_after_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            download_enabled: true,
            active_jobs_limit: default_active_jobs_limit(),
            queue_limit: default_queue_limit(),
            waiting_limit: default_waiting_limit(),
            retry_limit: default_retry_limit(),
            stale_after_secs: default_stale_after_secs(),
            server_url: None,
        }
    }
}

/// Tuning of the viewport-driven tile cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileCacheConfig {
    /// Factor applied to both dimensions of the viewport before eviction.
    #[serde(default = "default_eviction_scale")]
    pub eviction_scale: f64,

    /// Worker threads for tile parsing; 0 uses the available parallelism.
    #[serde(default)]
    pub worker_threads: usize,
}

fn default_eviction_scale() -> f64 {
    2.0
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            eviction_scale: default_eviction_scale(),
            worker_threads: 0,
        }
    }
}
