//! Sequential lock facade: the local lock composed with the global lock.
//!
//! Acquisition order is local then global; release order is global then
//! local. Another process can therefore never win the global lock while this
//! process still looks like the exclusive in-process holder.

use crate::config::Config;
use crate::error::Result;
use crate::local::{LocalLock, LocalLockGuard};
use crate::locks::{GlobalLock, GlobalLockGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The lock callers take before producing sound.
#[derive(Debug, Clone)]
pub struct SequentialLock {
    enabled: bool,
    local: LocalLock,
    global: GlobalLock,
}

/// Held sequential lock.
///
/// Fields drop in declaration order, which releases the global lock before
/// the local one.
#[derive(Debug)]
pub struct SequentialGuard {
    global: GlobalLockGuard,
    local: Option<LocalLockGuard>,
}

impl SequentialGuard {
    fn disabled() -> Self {
        Self {
            global: GlobalLockGuard::disabled(),
            local: None,
        }
    }

    /// Whether this guard actually excludes anyone.
    pub fn is_exclusive(&self) -> bool {
        self.local.is_some()
    }

    /// Release both locks now, global first.
    pub fn release(self) {
        let Self { global, local } = self;
        global.release();
        drop(local);
    }
}

impl SequentialLock {
    pub fn new(enabled: bool, global: GlobalLock) -> Self {
        Self {
            enabled,
            local: LocalLock::new(),
            global,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.sequential, GlobalLock::from_config(config))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn global(&self) -> &GlobalLock {
        &self.global
    }

    /// Acquire exclusive, host-wide permission to run.
    ///
    /// When sequential execution is disabled this returns immediately without
    /// touching the filesystem.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<SequentialGuard> {
        if !self.enabled {
            debug!("sequential execution disabled, skipping locks");
            return Ok(SequentialGuard::disabled());
        }

        let local = self.local.acquire(cancel).await?;
        match self.global.acquire(cancel).await {
            Ok(global) => Ok(SequentialGuard {
                global,
                local: Some(local),
            }),
            Err(e) => {
                drop(local);
                Err(e)
            }
        }
    }
}
