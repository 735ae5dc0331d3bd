//! Host-wide global lock.
//!
//! # Lock Directory
//!
//! The lock is a directory at a well-known path (see
//! [`crate::config::default_lock_dir`]). Creating it with `mkdir` is atomic on
//! every filesystem we care about, so whoever creates it holds the lock; its
//! existence alone is the lock state.
//!
//! # Lock Record
//!
//! Right after winning, the holder writes `content.json` into the directory:
//! - `pid`: process ID of the holder
//! - `start_time`: RFC3339 timestamp
//! - `hostname`: host the holder runs on
//!
//! The record is advisory. A missing or corrupt record never means "unlocked";
//! it only downgrades staleness detection to an age check on the directory.
//!
//! # Reclamation
//!
//! A lock whose holder is dead is renamed to a unique sibling and deleted.
//! Rename succeeds for exactly one contender, which makes cleanup race-free.
//!
//! # RAII Guards
//!
//! [`GlobalLockGuard`] releases the lock when dropped. Release failures are
//! logged but never panic or propagate.

mod guard;
mod metadata;
mod operations;
mod types;


/// Name of the record file inside the lock directory.
pub const RECORD_FILE_NAME: &str = "content.json";

pub use guard::GlobalLockGuard;
pub use metadata::LockRecord;
pub use operations::GlobalLock;
pub use types::{LockInfo, Staleness};
