//! Failure classification
//!
//! Decides whether a failed attempt is worth repeating. Transient failures are
//! network errors, timeouts, HTTP 429/502/503/504 and rate-limit or connection
//! messages; everything else is terminal.

use crate::error::OperationError;

/// Retry classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Another attempt may succeed
    Retryable,
    /// Repeating will not help
    Terminal,
}

/// Types that know their own retry classification
pub trait ClassifyError {
    /// Classify this failure
    fn class(&self) -> ErrorClass;
}

/// HTTP statuses treated as transient
const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Message fragments that mark a transient failure
const RETRYABLE_PATTERNS: [&str; 12] = [
    "rate limit",
    "ratelimit",
    "too many requests",
    "timeout",
    "timed out",
    "connection",
    "econnreset",
    "econnrefused",
    "etimedout",
    "socket hang up",
    "network",
    "temporarily unavailable",
];

/// Classify an HTTP status code
pub fn classify_status(status: u16) -> ErrorClass {
    if RETRYABLE_STATUSES.contains(&status) {
        ErrorClass::Retryable
    } else {
        ErrorClass::Terminal
    }
}

/// Classify a free-form error message
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    let has_status = lower
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|word| word.parse::<u16>().ok())
        .any(|code| RETRYABLE_STATUSES.contains(&code));

    if has_status || RETRYABLE_PATTERNS.iter().any(|p| lower.contains(p)) {
        ErrorClass::Retryable
    } else {
        ErrorClass::Terminal
    }
}

impl ClassifyError for OperationError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Http { status, .. } => classify_status(*status),
            Self::Network(_) | Self::RateLimited(_) => ErrorClass::Retryable,
            Self::Invalid(_) | Self::Unauthorized(_) => ErrorClass::Terminal,
            Self::Other(message) => classify_message(message),
        }
    }
}
