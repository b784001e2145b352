//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → tower-http request id (x-request-id assigned or kept, echoed back)
//!     → pipeline (RequestTrace, AuthGate)
//!     → handlers.rs / actuator.rs
//!     → response.rs (envelope)
//!     → Send to client
//! ```

pub mod actuator;
pub mod handlers;
pub mod response;
pub mod server;

pub use response::ApiResponse;
pub use server::{build_router, AppState, HttpServer, ServerError};
