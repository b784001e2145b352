//! Per-request context and client address extraction.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, Request};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";
pub const X_REQUEST_ID: &str = "x-request-id";

/// Reported when no client address is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// What the filters know about an inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    /// Addresses from `X-Forwarded-For`, client first.
    pub forwarded_for: Vec<String>,
    pub client_ip: String,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn from_request(req: &Request<Body>) -> Self {
        let headers = req.headers();
        let remote = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            forwarded_for: forwarded_chain(headers),
            client_ip: client_ip(headers, remote),
            request_id: header_str(headers, X_REQUEST_ID).map(str::to_string),
        }
    }
}

/// Resolve the client address.
///
/// Precedence: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// transport peer, then [`UNKNOWN_CLIENT`].
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    if let Some(forwarded) = header_str(headers, X_FORWARDED_FOR) {
        if let Some(first) = forwarded.split(',').next() {
            return first.trim().to_string();
        }
    }
    if let Some(real_ip) = header_str(headers, X_REAL_IP) {
        return real_ip.trim().to_string();
    }
    match remote {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}

/// Every non-empty `X-Forwarded-For` entry, in header order.
pub fn forwarded_chain(headers: &HeaderMap) -> Vec<String> {
    header_str(headers, X_FORWARDED_FOR)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
}
