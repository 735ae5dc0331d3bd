//! Cooperative cancellation of in-flight operations.
//!
//! Operations register a trigger under a correlation id before they start
//! work. The registry fires the trigger on request, and each entry expires on
//! its own so a lost completion signal cannot grow the table without bound.

pub mod ids;
pub mod notification;
pub mod operation;
pub mod registry;


pub use ids::{generate_correlation_id, sanitize_correlation_id};
pub use notification::handle_cancel_notification;
pub use operation::{Outcome, Registration, race};
pub use registry::{CancelTrigger, CancellationRegistry, RegistryLimits};
