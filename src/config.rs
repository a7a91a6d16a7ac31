//! Messaging configuration.
//!
//! Every field has a default, so a JSON document only needs the values it
//! changes:
//!
//! ```
//! use durable_bus::config::{MessagingConfig, SenderMode};
//!
//! let config = MessagingConfig::from_json_str(
//!     r#"{ "sender_mode": "durable_buffer", "local_queue": { "path": "/tmp/outbox" } }"#,
//! )
//! .unwrap();
//! assert_eq!(config.sender_mode, SenderMode::DurableBuffer);
//! assert_eq!(config.publish_attempts, 5);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backoff::BackoffConfig;
use crate::message::Codec;
use crate::sender::DEFAULT_PUBLISH_ATTEMPTS;
use crate::store::StoreOptions;

/// Error type for loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Which backend `send` uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderMode {
    /// Publish to the broker inside `send`.
    #[default]
    Direct,
    /// Persist to a local queue inside `send`; forward in the background.
    DurableBuffer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalQueueConfig {
    pub path: PathBuf,
    #[serde(with = "duration_ms", rename = "lock_timeout_ms")]
    pub lock_timeout: Duration,
    pub compact_threshold_bytes: u64,
}

impl Default for LocalQueueConfig {
    fn default() -> Self {
        let store = StoreOptions::default();
        Self {
            path: PathBuf::from("messaging-outbox"),
            lock_timeout: store.lock_timeout,
            compact_threshold_bytes: store.compact_threshold,
        }
    }
}

impl LocalQueueConfig {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::default()
            .with_lock_timeout(self.lock_timeout)
            .with_compact_threshold(self.compact_threshold_bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Worker threads per receiving endpoint.
    pub max_in_flight: usize,
    /// How long an idle local queue waits for new work per cycle.
    #[serde(with = "duration_ms", rename = "idle_wait_ms")]
    pub idle_wait: Duration,
    /// How long shutdown waits for buffered messages to go out.
    #[serde(with = "duration_ms", rename = "drain_timeout_ms")]
    pub drain_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            idle_wait: Duration::from_millis(100),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Top-level settings for senders and receivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub sender_mode: SenderMode,
    pub codec: Codec,
    pub publish_attempts: usize,
    pub backoff: BackoffConfig,
    pub local_queue: LocalQueueConfig,
    pub dispatcher: DispatcherConfig,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            sender_mode: SenderMode::default(),
            codec: Codec::default(),
            publish_attempts: DEFAULT_PUBLISH_ATTEMPTS,
            backoff: BackoffConfig::default(),
            local_queue: LocalQueueConfig::default(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl MessagingConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: MessagingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publish_attempts == 0 {
            return Err(ConfigError::invalid("publish_attempts", "must be at least 1"));
        }
        if self.backoff.multiplier == 0 {
            return Err(ConfigError::invalid("backoff.multiplier", "must be at least 1"));
        }
        if self.backoff.max < self.backoff.min {
            return Err(ConfigError::invalid(
                "backoff.max_ms",
                format!("{:?} is below min_ms {:?}", self.backoff.max, self.backoff.min),
            ));
        }
        if self.dispatcher.max_in_flight == 0 {
            return Err(ConfigError::invalid("dispatcher.max_in_flight", "must be at least 1"));
        }
        if self.sender_mode == SenderMode::DurableBuffer && self.local_queue.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid(
                "local_queue.path",
                "required when sender_mode is durable_buffer",
            ));
        }
        Ok(())
    }

    pub fn with_sender_mode(mut self, mode: SenderMode) -> Self {
        self.sender_mode = mode;
        self
    }

    pub fn with_local_queue_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_queue.path = path.into();
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.dispatcher.max_in_flight = max_in_flight;
        self
    }

    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.dispatcher.idle_wait = idle_wait;
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.dispatcher.drain_timeout = drain_timeout;
        self
    }
}

/// `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
