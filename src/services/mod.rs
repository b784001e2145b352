//! Dependency-facing services.
//!
//! # Data Flow
//! ```text
//! Route handler
//!     → WeatherService / SmsService
//!     → OutboundGuard (cache → breaker → retry → fallback)
//!     → WeatherProvider / SmsProvider
//! ```
//!
//! Each service owns the guard for its dependency and the fallback that
//! produces its degraded result.

pub mod sms;
pub mod weather;

pub use sms::{SmsDelivery, SmsService, SMS_DEPENDENCY};
pub use weather::{WeatherService, WEATHER_DEPENDENCY};
