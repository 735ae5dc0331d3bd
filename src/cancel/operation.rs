//! Helpers for making one operation cancellable.

use super::registry::CancellationRegistry;
use crate::error::{Result, SeqError};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of a step that may be cut short by cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }

    /// Fold cancellation into the error channel.
    pub fn into_result(self) -> Result<T> {
        self.completed().ok_or(SeqError::Cancelled)
    }
}

/// Run `fut` until it finishes or `token` fires.
///
/// On cancellation `fut` is dropped and `on_cancel` runs before returning, so
/// the caller can stop any output the future had started.
pub async fn race<F, C>(token: &CancellationToken, fut: F, on_cancel: C) -> Outcome<F::Output>
where
    F: Future,
    C: FnOnce(),
{
    tokio::select! {
        biased;
        () = token.cancelled() => {
            on_cancel();
            Outcome::Cancelled
        }
        value = fut => Outcome::Completed(value),
    }
}

/// A registry entry tied to a scope: it is completed when dropped.
///
/// Dropping only removes the entry this registration created. If the id was
/// registered again in the meantime the newer entry stays tracked.
///
/// When the registry refuses the entry the operation still runs, just without
/// external cancellation.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<CancellationRegistry>,
    id: String,
    token: CancellationToken,
    generation: Option<u64>,
}

impl Registration {
    pub fn open(registry: &Arc<CancellationRegistry>, id: &str) -> Self {
        let token = CancellationToken::new();
        let generation = match registry.register_token_entry(id, &token) {
            Ok(generation) => Some(generation),
            Err(SeqError::Capacity { max }) => {
                warn!(correlation_id = id, max, "registry full, running without cancellation support");
                None
            }
            Err(e) => {
                warn!(correlation_id = id, error = %e, "running without cancellation support");
                None
            }
        };

        Self {
            registry: Arc::clone(registry),
            id: id.to_string(),
            token,
            generation,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the registry is tracking this operation.
    pub fn is_tracked(&self) -> bool {
        self.generation.is_some()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(generation) = self.generation {
            self.registry.complete_generation(&self.id, generation);
            debug!(correlation_id = %self.id, "registration closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::RegistryLimits;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn race_returns_value_when_not_cancelled() {
        let token = CancellationToken::new();
        let outcome = race(&token, async { 7 }, || panic!("not cancelled")).await;
        assert_eq!(outcome, Outcome::Completed(7));
    }

    #[tokio::test]
    async fn race_runs_cancel_branch_and_drops_future() {
        let token = CancellationToken::new();
        let stopped = AtomicBool::new(false);

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let outcome = race(
            &token,
            tokio::time::sleep(Duration::from_secs(60)),
            || stopped.store(true, Ordering::SeqCst),
        )
        .await;

        assert!(outcome.is_cancelled());
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn fired_token_wins_over_ready_future() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = race(&token, async { 1 }, || {}).await;
        assert_eq!(outcome, Outcome::Cancelled);
    }

    #[test]
    fn outcome_into_result() {
        assert_eq!(Outcome::Completed(3).into_result().unwrap(), 3);
        assert!(Outcome::<()>::Cancelled.into_result().unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn registration_completes_on_drop() {
        let registry = Arc::new(CancellationRegistry::default());
        {
            let registration = Registration::open(&registry, "op-1");
            assert!(registration.is_tracked());
            assert_eq!(registry.active_count(), 1);
        }
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn registry_cancel_fires_registration_token() {
        let registry = Arc::new(CancellationRegistry::default());
        let registration = Registration::open(&registry, "op-1");

        assert!(registry.cancel("op-1", "stop"));
        assert!(registration.token().is_cancelled());
        drop(registration);
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn closing_a_replaced_registration_keeps_the_newer_one() {
        let registry = Arc::new(CancellationRegistry::default());
        let first = Registration::open(&registry, "say");
        let second = Registration::open(&registry, "say");

        drop(first);
        assert!(registry.contains("say"), "newer registration removed by older drop");

        assert!(registry.cancel("say", "stop"));
        assert!(second.token().is_cancelled());
        drop(second);
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn full_registry_degrades_to_untracked() {
        let registry = Arc::new(CancellationRegistry::new(RegistryLimits {
            max_entries: 1,
            ..RegistryLimits::default()
        }));
        let _first = Registration::open(&registry, "op-1");
        let second = Registration::open(&registry, "op-2");

        assert!(!second.is_tracked());
        assert!(!second.token().is_cancelled());
        drop(second);
        assert_eq!(registry.active_count(), 1, "untracked drop leaves others alone");
    }
}
