//! Shared HTTP client for external dependencies.
//!
//! # Responsibilities
//! - Build one pooled `reqwest::Client` with connect and total timeouts
//! - Map transport errors and HTTP statuses onto [`UpstreamError`]

use std::time::Duration;

use crate::config::TimeoutConfig;
use crate::resilience::error::UpstreamError;

/// Longest slice of an error body kept in an [`UpstreamError`].
const MAX_ERROR_DETAIL: usize = 256;

pub fn build_client(timeouts: &TimeoutConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(timeouts.connect())
        .timeout(timeouts.request())
        .user_agent(concat!("edge-gateway/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Classify a transport-level failure. `limit` is reported for timeouts.
pub fn classify_error(err: &reqwest::Error, limit: Duration) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout(limit)
    } else if err.is_decode() || err.is_builder() {
        UpstreamError::Permanent(err.to_string())
    } else if let Some(status) = err.status() {
        UpstreamError::from_status(status.as_u16(), err.to_string())
    } else {
        UpstreamError::Transient(err.to_string())
    }
}

/// Pass successful responses through; turn any other status into an error.
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::from_status(status.as_u16(), truncate(&body)))
}

fn truncate(body: &str) -> &str {
    if body.len() <= MAX_ERROR_DETAIL {
        return body;
    }
    let mut end = MAX_ERROR_DETAIL;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
