//! Global lock acquisition, staleness assessment, and reclamation.

use super::RECORD_FILE_NAME;
use super::guard::GlobalLockGuard;
use super::metadata::LockRecord;
use super::types::{LockInfo, Staleness};
use crate::config::Config;
use crate::error::{Result, SeqError};
use crate::process::{LivenessProbe, SystemProbe};
use rand::Rng;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of one pass over the lock directory.
#[derive(Debug)]
enum Attempt {
    Acquired(GlobalLockGuard),
    /// The lock was released or reclaimed; try again at once.
    Retry,
    Busy(Staleness),
}

/// Host-wide mutual exclusion built on atomic directory creation.
///
/// `mkdir` either creates the directory or fails with "already exists", so it
/// serves as the compare-and-swap. Crashed holders are detected through the
/// record inside the directory and reclaimed by renaming the directory away,
/// which only one contender can win.
#[derive(Debug, Clone)]
pub struct GlobalLock {
    dir: PathBuf,
    stale_grace: Duration,
    jitter: (Duration, Duration),
    probe: Arc<dyn LivenessProbe>,
}

impl GlobalLock {
    /// Lock at `dir` with default timings and the system liveness probe.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let defaults = Config::default();
        Self {
            dir: dir.into(),
            stale_grace: defaults.stale_grace(),
            jitter: defaults.retry_jitter(),
            probe: Arc::new(SystemProbe),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let (min, max) = config.retry_jitter();
        Self::new(config.lock_dir.clone())
            .with_stale_grace(config.stale_grace())
            .with_jitter(min, max)
    }

    pub fn with_probe(mut self, probe: Arc<dyn LivenessProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_stale_grace(mut self, grace: Duration) -> Self {
        self.stale_grace = grace;
        self
    }

    pub fn with_jitter(mut self, min: Duration, max: Duration) -> Self {
        self.jitter = (min, max.max(min));
        self
    }

    /// The lock directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file inside the lock directory.
    pub fn record_path(&self) -> PathBuf {
        self.dir.join(RECORD_FILE_NAME)
    }

    /// Acquire the lock, waiting as long as a live holder keeps it.
    ///
    /// Returns `SeqError::Cancelled` as soon as `cancel` fires while waiting,
    /// and `SeqError::Filesystem` when the directory cannot be created for any
    /// reason other than "already exists".
    ///
    /// Each attempt touches the filesystem and the liveness probe on the
    /// blocking pool, never on an async worker.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<GlobalLockGuard> {
        debug!(lock_dir = %self.dir.display(), pid = std::process::id(), "acquiring global lock");

        loop {
            if cancel.is_cancelled() {
                return Err(SeqError::Cancelled);
            }

            let lock = self.clone();
            let staleness = match tokio::task::spawn_blocking(move || lock.attempt())
                .await
                .map_err(|e| SeqError::Filesystem(format!("lock attempt failed: {}", e)))??
            {
                Attempt::Acquired(guard) => return Ok(guard),
                Attempt::Retry => continue,
                Attempt::Busy(staleness) => staleness,
            };
            debug!(lock_dir = %self.dir.display(), %staleness, "global lock busy, backing off");

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(lock_dir = %self.dir.display(), "global lock wait cancelled");
                    return Err(SeqError::Cancelled);
                }
                () = tokio::time::sleep(self.next_backoff()) => {}
            }
        }
    }

    /// Create the lock, or reclaim it when stale. Blocking.
    ///
    /// A guard returned here but never collected is released by its drop.
    fn attempt(&self) -> Result<Attempt> {
        if let Some(guard) = self.try_acquire()? {
            return Ok(Attempt::Acquired(guard));
        }

        let staleness = self.assess();
        if staleness == Staleness::Released
            || (staleness.is_stale() && self.reclaim(&staleness))
        {
            return Ok(Attempt::Retry);
        }
        Ok(Attempt::Busy(staleness))
    }

    /// Make a single attempt to create the lock directory.
    ///
    /// Returns `Ok(None)` when somebody else holds the lock.
    pub fn try_acquire(&self) -> Result<Option<GlobalLockGuard>> {
        self.ensure_parent()?;

        match fs::create_dir(&self.dir) {
            Ok(()) => {
                let record = self.write_record();
                debug!(lock_dir = %self.dir.display(), "global lock acquired");
                Ok(Some(GlobalLockGuard::new(self.dir.clone(), record)))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(SeqError::Filesystem(format!(
                "failed to create lock directory '{}': {}",
                self.dir.display(),
                e
            ))),
        }
    }

    /// Decide whether the existing lock directory may be reclaimed.
    pub fn assess(&self) -> Staleness {
        let metadata = match fs::metadata(&self.dir) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Staleness::Released,
            Err(e) => {
                debug!(lock_dir = %self.dir.display(), error = %e, "cannot inspect lock directory");
                return Staleness::Uninspectable;
            }
        };

        match LockRecord::from_file(self.record_path()) {
            Ok(record) if record.is_local() => {
                return if self.probe.is_alive(record.pid) {
                    Staleness::HolderAlive { pid: record.pid }
                } else {
                    Staleness::HolderDead { pid: record.pid }
                };
            }
            Ok(record) => {
                debug!(hostname = %record.hostname, "lock record from another host, using age");
            }
            Err(e) => debug!(error = %e, "lock record unusable, using age"),
        }

        let Ok(modified) = metadata.modified() else {
            return Staleness::Uninspectable;
        };
        // A modification time in the future counts as brand new.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        if age >= self.stale_grace {
            Staleness::UnverifiedExpired { age }
        } else {
            Staleness::UnverifiedFresh { age }
        }
    }

    /// Snapshot of the current lock, or `None` when unlocked.
    pub fn inspect(&self) -> Option<LockInfo> {
        if fs::symlink_metadata(&self.dir).is_err() {
            return None;
        }
        Some(LockInfo {
            path: self.dir.clone(),
            record: LockRecord::from_file(self.record_path()).ok(),
            staleness: self.assess(),
        })
    }

    /// Remove a lock left behind by someone else.
    ///
    /// Refuses to touch a lock whose holder is alive unless `force` is set.
    pub fn clear(&self, force: bool) -> Result<LockInfo> {
        let info = self.inspect().ok_or_else(|| {
            SeqError::UserError(format!("lock '{}' does not exist", self.dir.display()))
        })?;

        if !info.staleness.is_stale() && !force {
            return Err(SeqError::UserError(format!(
                "lock is not stale ({}); use --force to clear it anyway",
                info.staleness
            )));
        }

        if !self.reclaim(&info.staleness) {
            return Err(SeqError::UserError(
                "lock changed hands while clearing; inspect it again".to_string(),
            ));
        }

        Ok(info)
    }

    /// Take the lock directory away from its holder and delete it.
    ///
    /// Returns true when the lock path is free again.
    fn reclaim(&self, staleness: &Staleness) -> bool {
        let target = self.reclaim_path();

        match fs::rename(&self.dir, &target) {
            Ok(()) => {
                info!(
                    lock_dir = %self.dir.display(),
                    temp = %target.display(),
                    %staleness,
                    "reclaimed stale global lock"
                );
                if let Err(e) = fs::remove_dir_all(&target) {
                    warn!(path = %target.display(), error = %e, "failed to delete reclaimed lock");
                }
                true
            }
            // Released or reclaimed by someone else in the meantime.
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                debug!(lock_dir = %self.dir.display(), error = %e, "lost reclaim race");
                false
            }
        }
    }

    /// Unique sibling name for a reclaimed directory: `<dir>.stale.<pid>.<nanos base36>`.
    fn reclaim_path(&self) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut name = self.dir.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".stale.{}.{}", std::process::id(), to_base36(nanos)));
        self.dir.with_file_name(name)
    }

    fn write_record(&self) -> Option<LockRecord> {
        let record = LockRecord::current();
        match record.write(self.record_path()) {
            Ok(()) => Some(record),
            Err(e) => {
                warn!(error = %e, "failed to write lock record, staleness will fall back to age");
                None
            }
        }
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.dir.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                SeqError::Filesystem(format!(
                    "failed to create lock parent directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    fn next_backoff(&self) -> Duration {
        let (min, max) = self.jitter;
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}

pub(super) fn to_base36(mut value: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
