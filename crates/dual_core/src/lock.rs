//! Cross-process advisory locking for the registry file.
//!
//! The lock is an OS-level exclusive lock (`flock` on Unix, `LockFileEx` on
//! Windows, both via `fs2`) on `.dual/registry.json.lock`. The OS drops it when
//! the owning process dies, so there is no stale-lock cleanup to do. The lock
//! file itself is never deleted: unlinking a lock file while another process
//! has it open would let two processes hold "the" lock at once.

use crate::error::{DualError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default wait for the registry lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay between non-blocking lock attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Directory under the project root holding dual's state.
pub const STATE_DIR: &str = ".dual";

/// Registry file name inside [`STATE_DIR`].
pub const REGISTRY_FILE: &str = "registry.json";

/// Returns `<project_root>/.dual/registry.json.lock`. Pure path arithmetic.
pub fn lock_path(project_root: impl AsRef<Path>) -> PathBuf {
    project_root
        .as_ref()
        .join(STATE_DIR)
        .join(format!("{REGISTRY_FILE}.lock"))
}

/// Exclusive lock on a project's registry.
///
/// Released by [`RegistryLock::release`] or on drop, whichever comes first.
#[derive(Debug)]
pub struct RegistryLock {
    /// Open lock file; `None` once released.
    file: Option<File>,
    path: PathBuf,
}

impl RegistryLock {
    /// Acquires the lock for `project_root`, waiting up to `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `LockTimeout` if another process still holds the lock when the
    /// timeout elapses, `Lock` if the lock syscall fails for any other reason,
    /// and `Io` if the lock file cannot be created.
    pub fn acquire(project_root: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        Self::acquire_path(lock_path(project_root), timeout)
    }

    /// Acquires an exclusive lock on an arbitrary lock file path.
    pub fn acquire_path(path: PathBuf, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), waited_ms = start.elapsed().as_millis() as u64, "acquired registry lock");
                    return Ok(Self {
                        file: Some(file),
                        path,
                    });
                }
                Err(e) if is_contended(&e) => {
                    let elapsed = start.elapsed();
                    if elapsed >= timeout {
                        debug!(path = %path.display(), "registry lock wait timed out");
                        return Err(DualError::LockTimeout {
                            path,
                            timeout_ms: timeout.as_millis() as u64,
                        });
                    }
                    thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
                }
                Err(source) => return Err(DualError::Lock { path, source }),
            }
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true while the lock is held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Releases the lock. Calling it again is a no-op.
    pub fn release(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let unlocked = FileExt::unlock(&file);
        // Closing the descriptor drops the lock even if unlock failed.
        drop(file);
        debug!(path = %self.path.display(), "released registry lock");
        unlocked.map_err(|source| DualError::Lock {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// Distinguishes "someone else holds it" from real lock failures.
fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
