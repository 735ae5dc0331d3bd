//! In-process fast-path lock.
//!
//! Serializes operations inside one process before they contend for the
//! global lock, so only one task per process ever polls the lock directory.

use crate::error::{Result, SeqError};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellable in-process mutex. Cloning shares the same lock.
#[derive(Debug, Clone, Default)]
pub struct LocalLock {
    inner: Arc<Mutex<()>>,
}

/// Held local lock; released on drop.
#[derive(Debug)]
pub struct LocalLockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl LocalLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock unless `cancel` fires first.
    ///
    /// If the lock is granted in the same instant the token fires, the lock is
    /// dropped again before `SeqError::Cancelled` is returned.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<LocalLockGuard> {
        let lock = Arc::clone(&self.inner);

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("local lock wait cancelled");
                Err(SeqError::Cancelled)
            }
            guard = lock.lock_owned() => {
                if cancel.is_cancelled() {
                    drop(guard);
                    return Err(SeqError::Cancelled);
                }
                Ok(LocalLockGuard { _guard: guard })
            }
        }
    }

    /// Take the lock only if it is free right now.
    pub fn try_acquire(&self) -> Option<LocalLockGuard> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .ok()
            .map(|guard| LocalLockGuard { _guard: guard })
    }

    /// Whether some task currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
