//! Exclusive store ownership through a lock file holding the owner's PID.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::error::StoreError;

const RETRY_INTERVAL: Duration = Duration::from_millis(25);

pub(crate) struct LockFile {
    path: PathBuf,
    released: bool,
}

impl LockFile {
    /// Create `path` exclusively, waiting up to `timeout` for a current
    /// holder to release it. Locks left by dead processes are reclaimed.
    pub(crate) fn acquire(path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let deadline = Instant::now() + timeout;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    write!(file, "{}", process::id())?;
                    file.sync_all()?;
                    return Ok(Self {
                        path: path.to_path_buf(),
                        released: false,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(path) {
                        warn!(path = %path.display(), "reclaiming stale store lock");
                        remove_if_present(path)?;
                        continue;
                    }

                    let now = Instant::now();
                    if now >= deadline {
                        return Err(StoreError::LockTimeout {
                            path: path.to_path_buf(),
                            timeout,
                        });
                    }
                    debug!(path = %path.display(), "store locked, waiting");
                    thread::sleep(RETRY_INTERVAL.min(deadline - now));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub(crate) fn release(&mut self) -> Result<(), StoreError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        remove_if_present(&self.path)?;
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// A lock is stale when it names a process that no longer exists.
/// Unreadable or half-written lock files are never stale.
fn is_stale(path: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(pid) = contents.trim().parse::<u32>() else {
        return false;
    };
    pid != process::id() && !process_alive(pid)
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}
