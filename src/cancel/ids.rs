//! Correlation id hygiene.

use std::time::{SystemTime, UNIX_EPOCH};

const MAX_REQUEST_ID_CHARS: usize = 128;
const MAX_TOOL_NAME_CHARS: usize = 64;

/// Fresh id of the form `<tool>-<nanos>`.
pub fn generate_correlation_id(tool: &str) -> String {
    format!("{}-{}", sanitize_tool_name(tool), unix_nanos())
}

/// Restrict a caller-supplied id to `[A-Za-z0-9_-]`, at most 128 characters.
///
/// An id with nothing usable left becomes `safe-<nanos>`.
pub fn sanitize_correlation_id(id: &str) -> String {
    let safe = keep_chars(id, MAX_REQUEST_ID_CHARS, |c| c == '-' || c == '_');
    if safe.is_empty() {
        format!("safe-{}", unix_nanos())
    } else {
        safe
    }
}

/// Like [`sanitize_correlation_id`] but maps an unusable id to `invalid`, so
/// a garbage cancellation request can never match a generated id.
pub(crate) fn sanitize_notification_id(id: &str) -> String {
    let safe = keep_chars(id, MAX_REQUEST_ID_CHARS, |c| c == '-' || c == '_');
    if safe.is_empty() {
        "invalid".to_string()
    } else {
        safe
    }
}

fn sanitize_tool_name(name: &str) -> String {
    let safe = keep_chars(name, MAX_TOOL_NAME_CHARS, |c| c == '_');
    if safe.is_empty() {
        "unknown".to_string()
    } else {
        safe
    }
}

fn keep_chars(input: &str, max_chars: usize, extra: impl Fn(char) -> bool) -> String {
    input
        .chars()
        .take(max_chars)
        .filter(|c| c.is_ascii_alphanumeric() || extra(*c))
        .collect()
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}
