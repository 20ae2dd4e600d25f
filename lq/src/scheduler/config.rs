//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Worker pool capacity (max concurrent lookups)
    #[serde(default = "default_max_workers", rename = "max-workers")]
    pub max_workers: usize,

    /// Seconds the queue may stay empty before the run is declared quiescent
    #[serde(default = "default_queue_timeout_secs", rename = "queue-timeout-secs")]
    pub queue_timeout_secs: u64,

    /// Delay before a retry-later item becomes eligible again
    #[serde(default = "default_retry_delay_secs", rename = "retry-delay-secs")]
    pub retry_delay_secs: u64,

    /// Cap on re-stagings per item; `None` retries for as long as the API asks
    #[serde(default, rename = "max-retries")]
    pub max_retries: Option<u32>,
}

fn default_max_workers() -> usize {
    100
}

fn default_queue_timeout_secs() -> u64 {
    60
}

fn default_retry_delay_secs() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            queue_timeout_secs: default_queue_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            max_retries: None,
        }
    }
}

impl SchedulerConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Rate-limit parameters used to stagger initial eligibility times
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Calls the API allows per window
    #[serde(default = "default_calls_per_window", rename = "calls-per-window")]
    pub calls_per_window: u32,

    /// Window length in seconds
    #[serde(default = "default_window_secs", rename = "window-secs")]
    pub window_secs: u64,

    /// Calls held back from the ceiling as padding
    #[serde(default = "default_safety_margin", rename = "safety-margin")]
    pub safety_margin: u32,

    /// Delay before the first item becomes eligible, so the queue is fully built
    #[serde(default = "default_start_delay_secs", rename = "start-delay-secs")]
    pub start_delay_secs: u64,
}

fn default_calls_per_window() -> u32 {
    300
}

fn default_window_secs() -> u64 {
    60
}

fn default_safety_margin() -> u32 {
    100
}

fn default_start_delay_secs() -> u64 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            calls_per_window: default_calls_per_window(),
            window_secs: default_window_secs(),
            safety_margin: default_safety_margin(),
            start_delay_secs: default_start_delay_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Spacing between consecutive initial eligibility times
    pub fn interval(&self) -> Duration {
        let usable = u64::from(self.calls_per_window.saturating_sub(self.safety_margin).max(1));
        Duration::from_nanos(self.window_secs.saturating_mul(1_000_000_000) / usable)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }
}
