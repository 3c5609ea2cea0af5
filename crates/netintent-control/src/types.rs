//! Configuration types for the intent manager.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the intent manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Maximum number of reconciliations running at once.
    #[serde(default = "ManagerConfig::default_worker_threads")]
    pub worker_threads: usize,
    /// Capacity of the event broadcast channel.
    #[serde(default = "ManagerConfig::default_event_capacity")]
    pub event_capacity: usize,
    /// Route withdrawals through a precomputed operation set.
    #[serde(default)]
    pub coordinated_withdraw: bool,
    /// Periodically resubmit failed and corrupt intents.
    #[serde(default)]
    pub cleanup_enabled: bool,
    /// Seconds between cleanup passes.
    #[serde(default = "ManagerConfig::default_cleanup_period_seconds")]
    pub cleanup_period_seconds: u64,
    /// Failures after which cleanup stops resubmitting an intent.
    #[serde(default = "ManagerConfig::default_retry_threshold")]
    pub retry_threshold: u32,
}

impl ManagerConfig {
    const fn default_worker_threads() -> usize {
        12
    }

    const fn default_event_capacity() -> usize {
        1024
    }

    const fn default_cleanup_period_seconds() -> u64 {
        5
    }

    const fn default_retry_threshold() -> u32 {
        5
    }

    /// Interval between cleanup passes.
    #[must_use]
    pub const fn cleanup_period(&self) -> Duration {
        Duration::from_secs(self.cleanup_period_seconds)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            worker_threads: Self::default_worker_threads(),
            event_capacity: Self::default_event_capacity(),
            coordinated_withdraw: false,
            cleanup_enabled: false,
            cleanup_period_seconds: Self::default_cleanup_period_seconds(),
            retry_threshold: Self::default_retry_threshold(),
        }
    }
}
