//! Exit code constants for the seqspeak CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: The guarded operation failed
//! - 4: Global lock could not be acquired (filesystem problem)
//! - 130: The operation was cancelled

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// The guarded command could not be started or exited unsuccessfully.
pub const OPERATION_FAILURE: i32 = 2;

/// Lock failure: the lock directory could not be created or inspected.
pub const LOCK_FAILURE: i32 = 4;

/// Cancelled by request, interrupt, or timeout (128 + SIGINT).
pub const CANCELLED: i32 = 130;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, OPERATION_FAILURE, LOCK_FAILURE, CANCELLED];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn exit_codes_fit_in_a_byte() {
        for code in [SUCCESS, USER_ERROR, OPERATION_FAILURE, LOCK_FAILURE, CANCELLED] {
            assert!((0..=255).contains(&code));
        }
    }
}
