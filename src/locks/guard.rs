//! RAII guard for the global lock.

use super::RECORD_FILE_NAME;
use super::metadata::LockRecord;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Ownership of the global lock directory.
///
/// The lock is released exactly once: by [`GlobalLockGuard::release`] or on
/// drop, whichever comes first. Release never fails; problems are logged and
/// left for stale detection to clean up.
#[derive(Debug)]
pub struct GlobalLockGuard {
    /// Lock directory, `None` once released or when locking is disabled.
    dir: Option<PathBuf>,

    /// The record this holder wrote, if writing it succeeded.
    record: Option<LockRecord>,
}

impl GlobalLockGuard {
    pub(super) fn new(dir: PathBuf, record: Option<LockRecord>) -> Self {
        Self {
            dir: Some(dir),
            record,
        }
    }

    /// Guard that holds nothing, used when sequential execution is disabled.
    pub fn disabled() -> Self {
        Self {
            dir: None,
            record: None,
        }
    }

    /// Whether this guard owns a lock directory.
    pub fn is_held(&self) -> bool {
        self.dir.is_some()
    }

    /// Path of the held lock directory.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Release the lock now instead of at the end of scope.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let record_path = dir.join(RECORD_FILE_NAME);

        // Only the owner may remove the directory. A record naming someone
        // else means the lock was reclaimed out from under us.
        if let (Some(ours), Ok(on_disk)) = (&self.record, LockRecord::from_file(&record_path))
            && *ours != on_disk
        {
            warn!(
                lock_dir = %dir.display(),
                holder_pid = on_disk.pid,
                "lock was taken over by another holder, leaving it in place"
            );
            return;
        }

        if let Err(e) = fs::remove_file(&record_path)
            && e.kind() != ErrorKind::NotFound
        {
            warn!(path = %record_path.display(), error = %e, "failed to remove lock record");
        }

        match fs::remove_dir(&dir) {
            Ok(()) => debug!(lock_dir = %dir.display(), "global lock released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(lock_dir = %dir.display(), "lock directory already gone at release");
            }
            Err(e) => {
                // Stray files (e.g. an orphaned temp record) keep the directory
                // non-empty; the directory is still ours to delete.
                debug!(lock_dir = %dir.display(), error = %e, "retrying release recursively");
                if let Err(e) = fs::remove_dir_all(&dir) {
                    warn!(lock_dir = %dir.display(), error = %e, "failed to release global lock");
                }
            }
        }
    }
}

impl Drop for GlobalLockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}
