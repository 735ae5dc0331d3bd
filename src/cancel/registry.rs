//! Bounded, leak-free table of cancellable operations.

use crate::config::Config;
use crate::error::{Result, SeqError};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capability that tells one operation to stop. Invoked at most once.
pub type CancelTrigger = Box<dyn FnOnce() + Send + 'static>;

type EntryMap = HashMap<String, Entry>;

/// Bounds applied by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryLimits {
    pub max_entries: usize,
    pub ttl: Duration,
    pub max_id_len: usize,
    pub max_reason_len: usize,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RegistryLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_entries: config.max_registrations,
            ttl: config.registration_ttl(),
            max_id_len: config.max_id_len,
            max_reason_len: config.max_reason_len,
        }
    }
}

/// One tracked operation. Dropping an entry retires its expiry timer, so no
/// removal path can leave a timer behind.
///
/// The trigger sits behind a mutex so the table is `Sync` without asking
/// callers for `Sync` closures.
struct Entry {
    trigger: Mutex<Option<CancelTrigger>>,
    expiry: JoinHandle<()>,
    generation: u64,
}

impl Entry {
    fn take_trigger(&mut self) -> Option<CancelTrigger> {
        self.trigger
            .get_mut()
            .unwrap_or_else(|poison| poison.into_inner())
            .take()
    }
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.expiry.abort();
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("generation", &self.generation)
            .field("expiry_finished", &self.expiry.is_finished())
            .finish()
    }
}

/// Counts expiry timer tasks that have not finished or been aborted.
struct TimerTicket(Arc<AtomicUsize>);

impl TimerTicket {
    fn issue(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for TimerTicket {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Maps correlation ids to cancellation triggers.
///
/// Every mutation happens under one exclusive lock; [`active_count`] takes a
/// shared lock. Each entry expires after [`RegistryLimits::ttl`] without its
/// trigger being invoked, so lost completion signals cannot grow the table.
///
/// Registration spawns the expiry timer and therefore must run inside a
/// Tokio runtime.
///
/// [`active_count`]: CancellationRegistry::active_count
#[derive(Debug)]
pub struct CancellationRegistry {
    entries: Arc<RwLock<EntryMap>>,
    limits: RegistryLimits,
    next_generation: AtomicU64,
    live_timers: Arc<AtomicUsize>,
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new(RegistryLimits::default())
    }
}

impl CancellationRegistry {
    pub fn new(limits: RegistryLimits) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            limits,
            next_generation: AtomicU64::new(0),
            live_timers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn limits(&self) -> RegistryLimits {
        self.limits
    }

    /// Track `trigger` under `id`, replacing any previous entry for that id.
    ///
    /// Fails with `SeqError::Capacity` when the table is full. The replaced
    /// entry's timer is stopped without firing and its trigger is dropped
    /// uninvoked.
    pub fn register<F>(&self, id: &str, trigger: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.register_entry(id, Box::new(trigger)).map(|_| ())
    }

    /// Register and return the new entry's generation, which identifies this
    /// registration even after the id is reused.
    pub(crate) fn register_entry(&self, id: &str, trigger: CancelTrigger) -> Result<u64> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SeqError::Operation("cancellation registry requires a Tokio runtime".to_string())
        })?;

        let mut entries = self.write();

        if entries.len() >= self.limits.max_entries {
            warn!(
                current = entries.len(),
                max = self.limits.max_entries,
                "maximum concurrent requests reached, rejecting registration"
            );
            return Err(SeqError::Capacity {
                max: self.limits.max_entries,
            });
        }

        if id.len() > self.limits.max_id_len {
            warn!(length = id.len(), "correlation id too long, truncating");
        }
        let key = self.normalize_id(id).to_string();

        if remove_locked(&mut entries, &key).is_some() {
            debug!(correlation_id = %key, "replaced existing registration");
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let expiry = self.spawn_expiry(&runtime, key.clone(), generation);
        entries.insert(
            key.clone(),
            Entry {
                trigger: Mutex::new(Some(trigger)),
                expiry,
                generation,
            },
        );

        debug!(correlation_id = %key, "registered cancellable operation");
        Ok(generation)
    }

    /// Register a token: cancelling the entry cancels the token.
    pub fn register_token(&self, id: &str, token: &CancellationToken) -> Result<()> {
        self.register_token_entry(id, token).map(|_| ())
    }

    pub(crate) fn register_token_entry(&self, id: &str, token: &CancellationToken) -> Result<u64> {
        let token = token.clone();
        self.register_entry(id, Box::new(move || token.cancel()))
    }

    /// Cancel the operation registered under `id`.
    ///
    /// Returns false, changing nothing, when no such operation is tracked.
    pub fn cancel(&self, id: &str, reason: &str) -> bool {
        if id.is_empty() {
            warn!("empty correlation id provided for cancellation");
            return false;
        }
        let key = self.normalize_id(id);
        let reason = truncate_on_char_boundary(reason, self.limits.max_reason_len);

        // Invoke outside the table lock so a trigger may call back into the registry.
        let trigger = remove_locked(&mut self.write(), key);
        match trigger {
            Some(trigger) => {
                info!(correlation_id = %key, reason, "cancelling request");
                trigger();
                true
            }
            None => {
                debug!(correlation_id = %key, reason, "cancellation requested for unknown request");
                false
            }
        }
    }

    /// Stop tracking `id` without invoking its trigger.
    ///
    /// Returns whether an entry was removed.
    pub fn complete(&self, id: &str) -> bool {
        let key = self.normalize_id(id);
        let removed = remove_locked(&mut self.write(), key).is_some();
        if removed {
            debug!(correlation_id = %key, "cleaned up request tracking");
        }
        removed
    }

    /// Complete `id` only if it still holds the registration `generation`.
    ///
    /// A later registration under the same id is left alone.
    pub(crate) fn complete_generation(&self, id: &str, generation: u64) -> bool {
        let key = self.normalize_id(id);
        let mut entries = self.write();
        if entries.get(key).map(|e| e.generation) != Some(generation) {
            debug!(correlation_id = %key, "registration already replaced or removed");
            return false;
        }
        let removed = remove_locked(&mut entries, key).is_some();
        if removed {
            debug!(correlation_id = %key, "cleaned up request tracking");
        }
        removed
    }

    /// Number of operations currently tracked.
    pub fn active_count(&self) -> usize {
        self.read().len()
    }

    /// Number of expiry timers that are still pending.
    pub fn pending_timers(&self) -> usize {
        self.live_timers.load(Ordering::SeqCst)
    }

    /// Whether `id` is currently tracked.
    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(self.normalize_id(id))
    }

    /// Stop every timer, fire every trigger, and empty the table.
    pub fn shutdown(&self) {
        let drained: Vec<(String, Entry)> = self.write().drain().collect();
        let count = drained.len();

        for (id, mut entry) in drained {
            entry.expiry.abort();
            if let Some(trigger) = entry.take_trigger() {
                debug!(correlation_id = %id, "cancelling request at shutdown");
                trigger();
            }
        }

        info!(cancelled = count, "cancellation registry shutdown completed");
    }

    fn normalize_id<'a>(&self, id: &'a str) -> &'a str {
        truncate_on_char_boundary(id, self.limits.max_id_len)
    }

    fn spawn_expiry(
        &self,
        runtime: &tokio::runtime::Handle,
        key: String,
        generation: u64,
    ) -> JoinHandle<()> {
        let entries = Arc::downgrade(&self.entries);
        let ticket = TimerTicket::issue(&self.live_timers);
        let ttl = self.limits.ttl;

        runtime.spawn(async move {
            let _ticket = ticket;
            tokio::time::sleep(ttl).await;
            expire(&entries, &key, generation);
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, EntryMap> {
        self.entries
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, EntryMap> {
        self.entries
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Drop for CancellationRegistry {
    fn drop(&mut self) {
        // Entries abort their own timers as they are dropped.
        self.write().clear();
    }
}

/// The single removal path. Dropping the entry retires its timer.
fn remove_locked(entries: &mut EntryMap, key: &str) -> Option<CancelTrigger> {
    entries.remove(key).and_then(|mut entry| entry.take_trigger())
}

/// Force-complete an entry whose time ran out, unless it was replaced since.
fn expire(entries: &Weak<RwLock<EntryMap>>, key: &str, generation: u64) {
    let Some(entries) = entries.upgrade() else {
        return;
    };
    let mut entries = entries
        .write()
        .unwrap_or_else(|poison| poison.into_inner());

    if entries.get(key).map(|e| e.generation) == Some(generation) {
        // The trigger is dropped, not invoked: the operation is presumed abandoned.
        drop(remove_locked(&mut entries, key));
        warn!(correlation_id = %key, "registration expired without completing");
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character.
pub fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
