//! Outbound failure taxonomy.

use std::time::Duration;

use thiserror::Error;

/// A failed attempt against an external dependency.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Network-level failure: refused connection, reset, DNS, 5xx-class answers.
    #[error("transient upstream failure: {0}")]
    Transient(String),

    /// The attempt did not complete within its deadline.
    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    /// The dependency answered but rejected the request. Never retried.
    #[error("upstream rejected request: {0}")]
    Permanent(String),
}

impl UpstreamError {
    /// Classify an HTTP status returned by a dependency.
    ///
    /// 5xx, 408 and 429 are transient; every other non-success status is permanent.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = format!("status {status}: {}", detail.into());
        if status >= 500 || status == 408 || status == 429 {
            UpstreamError::Transient(detail)
        } else {
            UpstreamError::Permanent(detail)
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transient(_) | UpstreamError::Timeout(_))
    }
}

/// A call short-circuited by an open breaker without reaching the dependency.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker for '{dependency}' is open")]
pub struct BreakerOpen {
    pub dependency: String,
}
