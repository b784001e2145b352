//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to dependency (guard.rs):
//!     → cache.rs (hit returns immediately, no breaker involvement)
//!     → circuit_breaker.rs (admit, fast-fail, or admit a single half-open probe)
//!     → retries.rs + backoff.rs (re-attempt transient failures)
//!     → timeouts.rs (deadline per attempt)
//!     → circuit_breaker.rs (record success / failure)
//!     → fallback.rs (degraded value on any failure path)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Only transient failures are retried
//! - One breaker per dependency name, owned by an explicit registry
//! - The guard never returns an error; failures end in a tagged fallback value

pub mod backoff;
pub mod cache;
pub mod circuit_breaker;
pub mod error;
pub mod fallback;
pub mod guard;
pub mod retries;
pub mod timeouts;

pub use cache::{CachePolicy, ResponseCache};
pub use circuit_breaker::{
    Admission, BreakerRegistry, BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState,
};
pub use error::{BreakerOpen, UpstreamError};
pub use fallback::{Fallback, StaticFallback};
pub use guard::{CallOutcome, DegradeReason, Guarded, OutboundGuard};
pub use retries::RetryPolicy;
