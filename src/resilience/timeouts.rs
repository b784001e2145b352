//! Timeout enforcement.
//!
//! Every outbound attempt runs under a deadline; expiry is reported as
//! [`UpstreamError::Timeout`], which the retry policy treats as transient.
//! Dropping the wrapped future cancels the in-flight call.

use std::future::Future;
use std::time::Duration;

use crate::resilience::error::UpstreamError;

/// Run `fut` with a deadline.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout(limit)),
    }
}
