use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds and timing for the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Minimum number of whitespace-separated words in a description.
    pub min_description_words: usize,

    pub min_images: usize,

    pub max_images: usize,

    /// Per-image size limit in bytes.
    pub max_image_bytes: u64,

    /// Weekdays between submission and the resolution deadline.
    pub resolution_working_days: u32,

    /// Upper bound on one transition, retries included.
    pub transition_timeout_ms: u64,

    /// Retries after a transient store failure.
    pub max_store_retries: u32,

    /// Base delay between retries; attempt `n` waits `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_description_words: 40,
            min_images: 0,
            max_images: 5,
            max_image_bytes: 5 * 1024 * 1024,
            resolution_working_days: 10,
            transition_timeout_ms: 5_000,
            max_store_retries: 3,
            retry_backoff_ms: 25,
        }
    }
}

impl LifecycleConfig {
    pub fn transition_timeout(&self) -> Duration {
        Duration::from_millis(self.transition_timeout_ms)
    }

    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }
}
