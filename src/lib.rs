//! Edge gateway library.
//!
//! Inbound requests pass through an ordered filter [`pipeline`] before reaching
//! a route handler; handlers reach external dependencies through a
//! [`resilience::OutboundGuard`] (cache, circuit breaker, retry, fallback).

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod services;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
