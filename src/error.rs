//! Error types for seqspeak.
//!
//! Uses thiserror for derive macros. Each variant maps to an exit code so the
//! CLI can distinguish "cancelled" from "failed" from "misconfigured".

use crate::exit_codes;
use thiserror::Error;

/// Main error type for coordinator operations.
#[derive(Error, Debug)]
pub enum SeqError {
    /// The operation was aborted by an explicit cancel, an interrupt, or a timeout.
    #[error("operation cancelled")]
    Cancelled,

    /// The cancellation registry is full.
    ///
    /// Callers are expected to fall back to running without cancellability.
    #[error("too many concurrent requests (max {max})")]
    Capacity { max: usize },

    /// The lock directory could not be created or inspected for a reason
    /// other than "already exists".
    #[error("Lock acquisition failed: {0}")]
    Filesystem(String),

    /// Configuration could not be loaded or failed validation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The guarded operation itself failed.
    #[error("Operation failed: {0}")]
    Operation(String),

    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),
}

impl SeqError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SeqError::Cancelled => exit_codes::CANCELLED,
            SeqError::Capacity { .. } => exit_codes::OPERATION_FAILURE,
            SeqError::Filesystem(_) => exit_codes::LOCK_FAILURE,
            SeqError::Config(_) => exit_codes::USER_ERROR,
            SeqError::Operation(_) => exit_codes::OPERATION_FAILURE,
            SeqError::UserError(_) => exit_codes::USER_ERROR,
        }
    }

    /// Whether this error reports a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SeqError::Cancelled)
    }
}

/// Result type alias for seqspeak operations.
pub type Result<T> = std::result::Result<T, SeqError>;
