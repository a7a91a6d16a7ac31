//! Adaptive delay for idle or failing polling loops.
//!
//! `sleep_more()` grows the delay multiplicatively up to a cap and blocks the
//! caller for the new value; `reset()` drops it back to the minimum. A worker
//! that keeps finding nothing to do settles at one poll per `max` instead of
//! spinning.

mod sleeper;

pub use sleeper::{Sleeper, ThreadSleeper};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::duration_ms;

/// First step when growing from a zero minimum.
const ZERO_MIN_STEP: Duration = Duration::from_millis(1);

/// Bounds and growth factor for a [`BackoffController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    #[serde(with = "duration_ms", rename = "min_ms")]
    pub min: Duration,
    #[serde(with = "duration_ms", rename = "max_ms")]
    pub max: Duration,
    pub multiplier: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl BackoffConfig {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            ..Self::default()
        }
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }
}

/// Shared, thread-safe backoff state.
pub struct BackoffController {
    config: BackoffConfig,
    current: Mutex<Duration>,
    sleeper: Arc<dyn Sleeper>,
}

impl BackoffController {
    pub fn new(config: BackoffConfig) -> Self {
        Self::with_sleeper(config, Arc::new(ThreadSleeper))
    }

    pub fn with_sleeper(config: BackoffConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        let max = config.max.max(config.min);
        let config = BackoffConfig {
            max,
            multiplier: config.multiplier.max(1),
            ..config
        };
        Self {
            current: Mutex::new(config.min),
            config,
            sleeper,
        }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Current delay.
    pub fn delay(&self) -> Duration {
        *self.current.lock()
    }

    pub fn reset(&self) {
        *self.current.lock() = self.config.min;
    }

    /// Grow the delay (capped) and block for it. Returns the delay slept.
    pub fn sleep_more(&self) -> Duration {
        let delay = self.grow();
        trace!(delay_ms = delay.as_millis() as u64, "backing off");
        self.sleeper.sleep(delay);
        delay
    }

    fn grow(&self) -> Duration {
        let mut current = self.current.lock();
        let next = if current.is_zero() {
            ZERO_MIN_STEP
        } else {
            current
                .checked_mul(self.config.multiplier)
                .unwrap_or(self.config.max)
        };
        *current = next.clamp(self.config.min, self.config.max);
        *current
    }
}

impl Default for BackoffController {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
