//! Configuration model for seqspeak.
//!
//! Settings are resolved in three layers: an optional YAML file, then
//! `SEQSPEAK_*` environment variables, then CLI flags. Unknown YAML fields are
//! ignored for forward compatibility and every field has a sensible default.

mod model;
mod operations;


pub use model::{Config, default_lock_dir};
