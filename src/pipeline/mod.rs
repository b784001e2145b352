//! Inbound filter pipeline.
//!
//! # Data Flow
//! ```text
//! Request from the HTTP server
//!     → filter.rs (filters sorted once by order, ties by registration)
//!     → trace.rs (order -200: start clock, note method/path/client IP)
//!     → auth.rs (order -100: exemption match, bearer presence, validator)
//!     → route handler
//!     ← trace.rs (status + duration, covering everything above)
//! ```
//!
//! # Design Decisions
//! - The filter list is immutable once built; no registration during traffic
//! - A short-circuit is an ordinary response, never an error value
//! - `Next` is consumed by value, so a filter cannot resume the chain after answering

pub mod auth;
pub mod client_ip;
pub mod filter;
pub mod trace;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware;
use axum::response::Response;

use crate::config::AuthConfig;

pub use auth::{
    AuthError, AuthGate, ExemptionPattern, Identity, PresenceValidator, StaticTokenValidator,
    TokenValidator,
};
pub use client_ip::{client_ip, RequestContext};
pub use filter::{short_circuit, Filter, Next, Pipeline, PipelineBuilder, ShortCircuited};
pub use trace::{RequestTrace, TraceRecord};

/// The gateway's built-in chain: [`RequestTrace`] around [`AuthGate`].
///
/// Tokens are checked against `static_tokens` when any are configured,
/// otherwise only their presence is required.
pub fn standard_pipeline(auth: &AuthConfig) -> PipelineBuilder {
    let validator: Arc<dyn TokenValidator> = if auth.static_tokens.is_empty() {
        Arc::new(PresenceValidator)
    } else {
        Arc::new(StaticTokenValidator::new(auth.static_tokens.clone()))
    };

    Pipeline::builder()
        .register(RequestTrace::new())
        .register(AuthGate::new(auth.exempt_paths.iter().cloned(), validator))
}

/// Axum middleware running every request through `pipeline` before the router.
pub async fn pipeline_middleware(
    State(pipeline): State<Arc<Pipeline>>,
    req: Request<Body>,
    next: middleware::Next,
) -> Response {
    pipeline.handle(req, move |req| next.run(req)).await
}
