//! Filesystem utilities for seqspeak.

pub mod atomic;

pub use atomic::atomic_write;
