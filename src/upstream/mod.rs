//! External dependency clients.
//!
//! Providers perform exactly one attempt and report failures as
//! [`UpstreamError`](crate::resilience::UpstreamError); retries, breaking,
//! caching and fallbacks are applied by the services that call them. The peer
//! client is the exception and carries its own guards.

pub mod client;
pub mod peer;
pub mod sms;
pub mod weather;

pub use client::build_client;
pub use peer::{degraded_peer_response, PeerRequestError, PeerServiceClient};
pub use sms::{HttpSmsProvider, MockSmsProvider, SmsProvider, SmsReceipt};
pub use weather::{HttpWeatherProvider, WeatherProvider};
