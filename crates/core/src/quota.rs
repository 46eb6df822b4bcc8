//! Classification of rejected sample calls.
//!
//! The upstream reports quota exhaustion only through an English message,
//! so detection is a substring match. Replace [`classify_sample_rejection`]
//! once the upstream exposes a structured error code.

use crate::error::CoreError;

/// Marker the upstream puts in the message when the weekly quota is used up.
pub const WEEKLY_LIMIT_MARKER: &str = "You have reached your weekly limit";

pub fn is_weekly_limit(message: &str) -> bool {
    message.contains(WEEKLY_LIMIT_MARKER)
}

/// Map a sample response that carried no request id to an error.
pub fn classify_sample_rejection(message: Option<&str>) -> CoreError {
    match message {
        Some(msg) if is_weekly_limit(msg) => {
            CoreError::QuotaExceeded(WEEKLY_LIMIT_MARKER.to_string())
        }
        Some(msg) if !msg.trim().is_empty() => CoreError::Sample(msg.to_string()),
        _ => CoreError::Sample("upstream returned no request id".to_string()),
    }
}
