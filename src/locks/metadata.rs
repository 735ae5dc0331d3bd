//! Lock record stored inside the lock directory.

use crate::error::{Result, SeqError};
use crate::fs::atomic_write;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Advisory description of the current lock holder.
///
/// The lock directory's existence is what makes the lock held; this record
/// only helps other processes decide whether the holder has died.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Process ID of the lock holder.
    pub pid: u32,

    /// When the lock was acquired.
    pub start_time: DateTime<Utc>,

    /// Host the holder runs on.
    pub hostname: String,
}

impl LockRecord {
    /// Record describing the current process, stamped now.
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            start_time: Utc::now(),
            hostname: local_hostname(),
        }
    }

    /// Parse a record from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SeqError::Filesystem(format!(
                "failed to read lock record '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            SeqError::Filesystem(format!(
                "failed to parse lock record '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Serialize the record to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SeqError::Filesystem(format!("failed to serialize lock record: {}", e)))
    }

    /// Atomically write the record to `path`.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        atomic_write(path, self.to_json()?.as_bytes())
    }

    /// Whether the recorded pid can be checked from this host.
    pub fn is_local(&self) -> bool {
        self.hostname == local_hostname()
    }

    /// Time elapsed since the lock was acquired.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.start_time)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        format_age(self.age())
    }
}

pub(crate) fn format_age(age: Duration) -> String {
    let seconds = age.num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Host name of this machine, or `unknown` when it cannot be determined.
pub(crate) fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
