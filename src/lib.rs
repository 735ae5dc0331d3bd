//! Host-wide sequential execution and cooperative cancellation.
//!
//! Operations that produce sound take the [`sequential::SequentialLock`]
//! before they start, so at most one of them runs on a host at any instant,
//! across tasks and across processes. Each operation is registered in a
//! [`cancel::CancellationRegistry`] under a correlation id so it can be
//! stopped from outside. [`coordinator::Coordinator`] ties the two together.

pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod local;
pub mod locks;
pub mod logging;
pub mod process;
pub mod sequential;

#[cfg(test)]
mod test_support;

pub use coordinator::Coordinator;
pub use error::{Result, SeqError};
