//! Outbound call guard.
//!
//! Wraps a single dependency call in a fixed composition, outer to inner:
//!
//! ```text
//! cache lookup ──hit──────────────────────────────────────────▶ Cached(value)
//!      │ miss
//!      ▼
//! breaker admission ──rejected──────────────────────▶ fallback ▶ Degraded
//!      │ admitted
//!      ▼
//! retry(operation under per-attempt timeout)
//!      │
//!      ▼
//! breaker accounting ──failure──────────────────────▶ fallback ▶ Degraded
//!      │ success
//!      ▼
//! cache store ──────────────────────────────────────────────────▶ Fresh(value)
//! ```
//!
//! Cache hits never reach the breaker, so they never count toward failure
//! statistics. The guard is total: every path ends in a value.
//!
//! [`OutboundGuard::call`] and [`OutboundGuard::call_blocking`] share the same
//! decision steps and differ only in how the operation is driven and how the
//! backoff is waited out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::cache::{CachePolicy, ResponseCache};
use crate::resilience::circuit_breaker::{Admission, BreakerRegistry, CircuitState};
use crate::resilience::error::{BreakerOpen, UpstreamError};
use crate::resilience::fallback::Fallback;
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::with_timeout;

/// Outcome of a guarded call, for accounting and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
    FallbackUsed,
    CacheHit,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::FallbackUsed => "fallback_used",
            CallOutcome::CacheHit => "cache_hit",
        }
    }
}

/// Why a guarded call fell back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradeReason {
    /// The dependency was not attempted.
    BreakerOpen(BreakerOpen),
    /// Every permitted attempt failed; holds the last error.
    Upstream(UpstreamError),
}

/// Result of a guarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<V> {
    /// Produced by the dependency during this call.
    Fresh(V),
    /// Served from the cache.
    Cached(V),
    /// Produced by the fallback.
    Degraded { value: V, reason: DegradeReason },
}

impl<V> Guarded<V> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Guarded::Degraded { .. })
    }

    pub fn value(&self) -> &V {
        match self {
            Guarded::Fresh(v) | Guarded::Cached(v) => v,
            Guarded::Degraded { value, .. } => value,
        }
    }

    pub fn into_inner(self) -> V {
        match self {
            Guarded::Fresh(v) | Guarded::Cached(v) => v,
            Guarded::Degraded { value, .. } => value,
        }
    }
}

enum Admitted<V> {
    Hit(V),
    Rejected(BreakerOpen),
    Proceed(Admission),
}

/// Cache + breaker + retry + fallback decorator for calls returning `V`.
#[derive(Debug)]
pub struct OutboundGuard<V> {
    cache: ResponseCache<V>,
    breakers: Arc<BreakerRegistry>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl<V: Clone> OutboundGuard<V> {
    pub fn new(
        breakers: Arc<BreakerRegistry>,
        retry: RetryPolicy,
        cache: CachePolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            cache: ResponseCache::new(cache),
            breakers,
            retry,
            attempt_timeout,
        }
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub fn cache(&self) -> &ResponseCache<V> {
        &self.cache
    }

    /// Run `operation` against `dependency`, suspending only while the
    /// operation, or the backoff between attempts, is awaited.
    pub async fn call<Op, Fut, Fb>(
        &self,
        dependency: &str,
        key: &str,
        mut operation: Op,
        fallback: Fb,
    ) -> Guarded<V>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<V, UpstreamError>>,
        Fb: Fallback<V>,
    {
        let admission = match self.admit(dependency, key) {
            Admitted::Hit(value) => return Guarded::Cached(value),
            Admitted::Rejected(open) => {
                return self.degrade(dependency, key, &fallback, DegradeReason::BreakerOpen(open))
            }
            Admitted::Proceed(admission) => admission,
        };

        let mut attempt = 1;
        let result = loop {
            match with_timeout(self.attempt_timeout, operation()).await {
                Ok(value) => break Ok(value),
                Err(err) if self.should_retry(dependency, &admission, attempt, &err) => {
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                    if self.tripped(dependency, &admission, attempt) {
                        break Err(err);
                    }
                    attempt += 1;
                }
                Err(err) => break Err(err),
            }
        };

        self.settle(dependency, key, admission, result, &fallback)
    }

    /// Same composition as [`OutboundGuard::call`] for a synchronous operation.
    ///
    /// The operation is expected to bound itself (e.g. a blocking client with
    /// its own timeouts); backoff blocks the calling thread.
    pub fn call_blocking<Op, Fb>(
        &self,
        dependency: &str,
        key: &str,
        mut operation: Op,
        fallback: Fb,
    ) -> Guarded<V>
    where
        Op: FnMut() -> Result<V, UpstreamError>,
        Fb: Fallback<V>,
    {
        let admission = match self.admit(dependency, key) {
            Admitted::Hit(value) => return Guarded::Cached(value),
            Admitted::Rejected(open) => {
                return self.degrade(dependency, key, &fallback, DegradeReason::BreakerOpen(open))
            }
            Admitted::Proceed(admission) => admission,
        };

        let mut attempt = 1;
        let result = loop {
            match operation() {
                Ok(value) => break Ok(value),
                Err(err) if self.should_retry(dependency, &admission, attempt, &err) => {
                    std::thread::sleep(self.retry.backoff(attempt));
                    if self.tripped(dependency, &admission, attempt) {
                        break Err(err);
                    }
                    attempt += 1;
                }
                Err(err) => break Err(err),
            }
        };

        self.settle(dependency, key, admission, result, &fallback)
    }

    fn admit(&self, dependency: &str, key: &str) -> Admitted<V> {
        if let Some(value) = self.cache.get(dependency, key) {
            tracing::debug!(dependency, key, "Cache hit");
            metrics::record_outbound(dependency, CallOutcome::CacheHit);
            return Admitted::Hit(value);
        }

        match self.breakers.get(dependency).try_acquire(Instant::now()) {
            Ok(admission) => {
                if admission.is_probe() {
                    tracing::info!(dependency, "Admitting half-open probe");
                }
                Admitted::Proceed(admission)
            }
            Err(open) => {
                tracing::debug!(dependency, "Breaker open, skipping dependency");
                Admitted::Rejected(open)
            }
        }
    }

    fn should_retry(
        &self,
        dependency: &str,
        admission: &Admission,
        attempt: u32,
        err: &UpstreamError,
    ) -> bool {
        if !self.retry.should_retry(attempt, err) || self.tripped(dependency, admission, attempt) {
            return false;
        }
        tracing::info!(dependency, attempt, error = %err, "Retrying outbound call");
        true
    }

    /// Whether another caller moved the breaker out from under this admission.
    ///
    /// A probe owns the half-open slot and only stops once the circuit reopens.
    /// Any other caller stops as soon as the circuit leaves Closed, so its
    /// retries never run alongside a probe.
    fn tripped(&self, dependency: &str, admission: &Admission, attempt: u32) -> bool {
        let state = admission.breaker().state();
        let tripped = if admission.is_probe() {
            state == CircuitState::Open
        } else {
            state != CircuitState::Closed
        };
        if tripped {
            tracing::debug!(
                dependency,
                attempt,
                state = state.as_str(),
                "Breaker left closed mid-retry, aborting"
            );
        }
        tripped
    }

    fn settle<Fb: Fallback<V>>(
        &self,
        dependency: &str,
        key: &str,
        admission: Admission,
        result: Result<V, UpstreamError>,
        fallback: &Fb,
    ) -> Guarded<V> {
        match result {
            Ok(value) => {
                admission.succeed();
                self.cache.insert(dependency, key, value.clone());
                metrics::record_outbound(dependency, CallOutcome::Success);
                Guarded::Fresh(value)
            }
            Err(err) => {
                tracing::warn!(dependency, key, error = %err, "Outbound call failed");
                admission.fail(Instant::now());
                metrics::record_outbound(dependency, CallOutcome::Failure);
                self.degrade(dependency, key, fallback, DegradeReason::Upstream(err))
            }
        }
    }

    fn degrade<Fb: Fallback<V>>(
        &self,
        dependency: &str,
        key: &str,
        fallback: &Fb,
        reason: DegradeReason,
    ) -> Guarded<V> {
        metrics::record_outbound(dependency, CallOutcome::FallbackUsed);
        Guarded::Degraded {
            value: fallback.degrade(key),
            reason,
        }
    }
}
