//! Cancellation requests arriving as JSON-RPC notifications.

use super::ids::sanitize_notification_id;
use super::registry::CancellationRegistry;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// JSON-RPC method that carries cancellation requests.
pub const CANCELLED_METHOD: &str = "notifications/cancelled";

/// Largest serialized params payload that is looked at.
pub const MAX_PARAMS_BYTES: usize = 4096;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelParams {
    #[serde(default)]
    request_id: Option<RequestId>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RequestId {
    Text(String),
    Number(i64),
}

impl RequestId {
    fn into_string(self) -> String {
        match self {
            RequestId::Text(s) => s,
            RequestId::Number(n) => n.to_string(),
        }
    }
}

/// Route a notification to the registry.
///
/// Returns true only when a tracked operation was cancelled. Other methods,
/// oversized or malformed params, and unknown ids all yield false.
pub fn handle_cancel_notification(
    registry: &CancellationRegistry,
    method: &str,
    params: &Value,
) -> bool {
    debug!(method, "received notification");
    if method != CANCELLED_METHOD {
        return false;
    }

    let size = serde_json::to_vec(params).map(|b| b.len()).unwrap_or(usize::MAX);
    if size > MAX_PARAMS_BYTES {
        warn!(size, "notification params too large, ignoring");
        return false;
    }

    let parsed = match CancelParams::deserialize(params) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "failed to parse cancellation params");
            return false;
        }
    };

    let Some(raw_id) = parsed.request_id.map(RequestId::into_string) else {
        warn!("received cancellation notification without requestId");
        return false;
    };
    if raw_id.is_empty() {
        warn!("received cancellation notification without requestId");
        return false;
    }

    let request_id = sanitize_notification_id(&raw_id);
    let reason = parsed.reason.unwrap_or_default();
    info!(request_id = %request_id, "processing cancellation notification");

    registry.cancel(&request_id, &reason)
}
