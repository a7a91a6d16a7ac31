use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error type for durable store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] io::Error),

    /// Another holder kept the store lock for the whole wait.
    #[error("timed out after {timeout:?} waiting for store lock {}", path.display())]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("store is closed")]
    Closed,

    #[error("record of {0} bytes exceeds the maximum record size")]
    RecordTooLarge(usize),

    #[error("store metadata error: {0}")]
    Meta(#[from] serde_json::Error),
}
