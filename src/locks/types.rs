//! Staleness verdicts and lock inspection results.

use super::metadata::{LockRecord, format_age};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Verdict on an existing lock directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// The recorded holder no longer exists.
    HolderDead { pid: u32 },
    /// The recorded holder is running. Never reclaimed, however old.
    HolderAlive { pid: u32 },
    /// No usable record and the directory is younger than the grace period.
    UnverifiedFresh { age: Duration },
    /// No usable record and the directory has outlived the grace period.
    UnverifiedExpired { age: Duration },
    /// The lock directory could not be inspected at all.
    Uninspectable,
    /// The lock directory disappeared between the failed `mkdir` and the check.
    Released,
}

impl Staleness {
    /// Whether the lock may be reclaimed.
    pub fn is_stale(&self) -> bool {
        match self {
            Staleness::HolderDead { .. }
            | Staleness::UnverifiedExpired { .. }
            | Staleness::Uninspectable => true,
            Staleness::HolderAlive { .. }
            | Staleness::UnverifiedFresh { .. }
            | Staleness::Released => false,
        }
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::HolderDead { pid } => write!(f, "holder {} is dead", pid),
            Staleness::HolderAlive { pid } => write!(f, "holder {} is alive", pid),
            Staleness::UnverifiedFresh { age } => {
                write!(f, "no readable record, within grace period ({}s old)", age.as_secs())
            }
            Staleness::UnverifiedExpired { age } => {
                write!(f, "no readable record, grace period expired ({}s old)", age.as_secs())
            }
            Staleness::Uninspectable => write!(f, "lock directory cannot be inspected"),
            Staleness::Released => write!(f, "lock was released"),
        }
    }
}

/// Snapshot of the global lock as seen by `lock status`.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The lock directory path.
    pub path: PathBuf,

    /// The holder's record, if it could be read.
    pub record: Option<LockRecord>,

    /// The staleness verdict at inspection time.
    pub staleness: Staleness,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(record) = &self.record {
            write!(
                f,
                " (pid: {}, host: {}, age: {})",
                record.pid,
                record.hostname,
                format_age(record.age())
            )?;
        }
        write!(f, ": {}", self.staleness)?;
        if self.staleness.is_stale() {
            write!(f, ", STALE")?;
        }
        Ok(())
    }
}
