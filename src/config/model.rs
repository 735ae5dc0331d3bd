//! Config struct definition and default implementation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Name of the lock directory shared by every cooperating process on a host.
const LOCK_DIR_NAME: &str = "seqspeak-global.lock.d";

/// Configuration for the sequential execution coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Whether audio-producing operations must run one at a time host-wide.
    ///
    /// When false, lock acquisition is a no-op that never touches the filesystem.
    #[serde(default = "default_true")]
    pub sequential: bool,

    /// Path of the lock directory. Defaults to a well-known temp location.
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,

    /// Seconds a lock without a readable record must exist before it is
    /// treated as abandoned.
    #[serde(default = "default_stale_grace_secs")]
    pub stale_grace_secs: u64,

    /// Lower bound of the randomized wait between acquisition attempts.
    #[serde(default = "default_retry_jitter_min_ms")]
    pub retry_jitter_min_ms: u64,

    /// Upper bound of the randomized wait between acquisition attempts.
    #[serde(default = "default_retry_jitter_max_ms")]
    pub retry_jitter_max_ms: u64,

    // =========================================================================
    // Cancellation registry settings
    // =========================================================================
    /// Maximum number of operations tracked for cancellation at once.
    #[serde(default = "default_max_registrations")]
    pub max_registrations: usize,

    /// Seconds after which an unfinished registration is dropped.
    #[serde(default = "default_registration_ttl_secs")]
    pub registration_ttl_secs: u64,

    /// Maximum correlation id length in bytes.
    #[serde(default = "default_max_id_len")]
    pub max_id_len: usize,

    /// Maximum cancellation reason length in bytes.
    #[serde(default = "default_max_reason_len")]
    pub max_reason_len: usize,

    /// Milliseconds a cancelled operation gets to wind down before it is
    /// dropped.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

impl Config {
    pub fn stale_grace(&self) -> Duration {
        Duration::from_secs(self.stale_grace_secs)
    }

    pub fn registration_ttl(&self) -> Duration {
        Duration::from_secs(self.registration_ttl_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    pub fn retry_jitter(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.retry_jitter_min_ms),
            Duration::from_millis(self.retry_jitter_max_ms),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sequential: default_true(),
            lock_dir: default_lock_dir(),
            stale_grace_secs: default_stale_grace_secs(),
            retry_jitter_min_ms: default_retry_jitter_min_ms(),
            retry_jitter_max_ms: default_retry_jitter_max_ms(),
            max_registrations: default_max_registrations(),
            registration_ttl_secs: default_registration_ttl_secs(),
            max_id_len: default_max_id_len(),
            max_reason_len: default_max_reason_len(),
            cancel_grace_ms: default_cancel_grace_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Platform default for the lock directory.
///
/// Unix uses `/tmp` directly rather than `$TMPDIR`, so processes started with
/// different per-user temp dirs still contend on the same path.
pub fn default_lock_dir() -> PathBuf {
    #[cfg(unix)]
    {
        PathBuf::from("/tmp").join(LOCK_DIR_NAME)
    }

    #[cfg(not(unix))]
    {
        std::env::temp_dir().join(LOCK_DIR_NAME)
    }
}

fn default_stale_grace_secs() -> u64 {
    300
}

fn default_retry_jitter_min_ms() -> u64 {
    25
}

fn default_retry_jitter_max_ms() -> u64 {
    75
}

fn default_max_registrations() -> usize {
    1000
}

fn default_registration_ttl_secs() -> u64 {
    30 * 60
}

fn default_max_id_len() -> usize {
    256
}

fn default_max_reason_len() -> usize {
    500
}

fn default_cancel_grace_ms() -> u64 {
    2000
}
