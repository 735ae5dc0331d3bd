//! Runs operations one at a time, host-wide, with cancellation support.
//!
//! [`Coordinator::run`] is the single entry point callers need: it registers
//! the operation for cancellation, waits for the sequential lock, runs the
//! operation, and releases everything on every exit path.

use crate::cancel::{CancellationRegistry, Outcome, Registration, RegistryLimits};
use crate::config::Config;
use crate::error::{Result, SeqError};
use crate::sequential::SequentialLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a cancelled operation may keep running before it is dropped.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Sequential lock plus cancellation registry, shared by all operations of
/// one process.
#[derive(Debug, Clone)]
pub struct Coordinator {
    lock: SequentialLock,
    registry: Arc<CancellationRegistry>,
    cancel_grace: Duration,
}

impl Coordinator {
    pub fn new(lock: SequentialLock, registry: Arc<CancellationRegistry>) -> Self {
        Self {
            lock,
            registry,
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SequentialLock::from_config(config),
            Arc::new(CancellationRegistry::new(RegistryLimits::from(config))),
        )
        .with_cancel_grace(config.cancel_grace())
    }

    /// Set how long a cancelled operation may run on before it is dropped.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    pub fn cancel_grace(&self) -> Duration {
        self.cancel_grace
    }

    pub fn registry(&self) -> &Arc<CancellationRegistry> {
        &self.registry
    }

    pub fn lock(&self) -> &SequentialLock {
        &self.lock
    }

    /// Run `op` exclusively under correlation id `id`.
    ///
    /// `op` receives the operation's token and should stop producing output
    /// as soon as it fires, returning `SeqError::Cancelled`. That is reported
    /// as `Ok(Outcome::Cancelled)`, as is cancellation while waiting for the
    /// lock. `op` is awaited to the end, so its own cleanup runs while the
    /// lock is still held. An `op` still running [`cancel_grace`] after the
    /// token fired is dropped and the run reports `Outcome::Cancelled`.
    ///
    /// [`cancel_grace`]: Coordinator::cancel_grace
    pub async fn run<F, Fut, T>(&self, id: &str, op: F) -> Result<Outcome<T>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // Registered before waiting so the lock wait itself can be cancelled.
        let registration = Registration::open(&self.registry, id);
        let token = registration.token().clone();

        let guard = match self.lock.acquire(&token).await {
            Ok(guard) => guard,
            Err(SeqError::Cancelled) => {
                info!(correlation_id = id, "cancelled while waiting for sequential lock");
                return Ok(Outcome::Cancelled);
            }
            Err(e) => return Err(e),
        };
        debug!(correlation_id = id, exclusive = guard.is_exclusive(), "running operation");

        // Scoped so the operation is dropped before the lock is released.
        let result = {
            let work = op(token.clone());
            tokio::pin!(work);
            tokio::select! {
                biased;
                result = &mut work => result,
                () = grace_expired(&token, self.cancel_grace) => {
                    warn!(
                        correlation_id = id,
                        grace_ms = self.cancel_grace.as_millis() as u64,
                        "operation ignored cancellation, dropping it"
                    );
                    Err(SeqError::Cancelled)
                }
            }
        };

        guard.release();
        drop(registration);

        match result {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(SeqError::Cancelled) => {
                info!(correlation_id = id, "operation cancelled");
                Ok(Outcome::Cancelled)
            }
            Err(e) => Err(e),
        }
    }

    /// Cancel every tracked operation. Used at process teardown.
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}

/// Resolves `grace` after `token` fires.
async fn grace_expired(token: &CancellationToken, grace: Duration) {
    token.cancelled().await;
    tokio::time::sleep(grace).await;
}
