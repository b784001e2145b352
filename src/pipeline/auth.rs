//! Bearer-token gate.
//!
//! # Responsibilities
//! - Let exempt paths through untouched
//! - Require an `Authorization: Bearer <token>` header everywhere else
//! - Delegate the token itself to an injected [`TokenValidator`]
//! - Attach the accepted [`Identity`] to the request extensions
//!
//! Both failure modes answer with a bare 401 and no body.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::pipeline::filter::{short_circuit, Filter, Next};

/// Position of the gate in the chain; runs inside [`RequestTrace`](super::RequestTrace).
pub const AUTH_GATE_ORDER: i32 = -100;

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticated caller, available to handlers as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,

    #[error("token rejected: {0}")]
    Rejected(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

/// Decides whether a bearer token identifies a caller.
///
/// `Err` carries the rejection reason, which is logged but never sent to the client.
pub trait TokenValidator: Send + Sync {
    fn validate<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Identity, String>>;
}

/// Accepts any token: the gate only establishes that one was presented.
#[derive(Debug, Clone, Default)]
pub struct PresenceValidator;

impl TokenValidator for PresenceValidator {
    fn validate<'a>(&'a self, _token: &'a str) -> BoxFuture<'a, Result<Identity, String>> {
        Box::pin(async {
            Ok(Identity {
                subject: "anonymous".to_string(),
            })
        })
    }
}

/// Fixed token → subject table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<String, String>,
}

impl StaticTokenValidator {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

impl TokenValidator for StaticTokenValidator {
    fn validate<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Identity, String>> {
        Box::pin(async move {
            self.tokens
                .get(token)
                .map(|subject| Identity {
                    subject: subject.clone(),
                })
                .ok_or_else(|| "unknown token".to_string())
        })
    }
}

/// A path rule that bypasses authentication.
///
/// The whole path must match; `**` stands for any run of characters,
/// including `/` and the empty string. Everything else is literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExemptionPattern {
    raw: String,
    literals: Vec<String>,
}

impl ExemptionPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let literals = raw.split("**").map(str::to_string).collect();
        Self { raw, literals }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let Some((first, rest)) = self.literals.split_first() else {
            return false;
        };
        let Some((last, middle)) = rest.split_last() else {
            return path == first;
        };

        let Some(mut remaining) = path.strip_prefix(first.as_str()) else {
            return false;
        };
        for literal in middle {
            match remaining.find(literal.as_str()) {
                Some(at) => remaining = &remaining[at + literal.len()..],
                None => return false,
            }
        }
        remaining.ends_with(last.as_str())
    }
}

/// Gate filter enforcing bearer-token presence on non-exempt paths.
pub struct AuthGate {
    exemptions: Vec<ExemptionPattern>,
    validator: Arc<dyn TokenValidator>,
}

impl AuthGate {
    pub fn new<I, S>(exempt_paths: I, validator: Arc<dyn TokenValidator>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exemptions: exempt_paths.into_iter().map(ExemptionPattern::new).collect(),
            validator,
        }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exemptions.iter().any(|p| p.matches(path))
    }
}

/// Token following the case-sensitive `Bearer ` prefix.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
}

impl Filter for AuthGate {
    fn name(&self) -> &'static str {
        "auth_gate"
    }

    fn order(&self) -> i32 {
        AUTH_GATE_ORDER
    }

    fn run<'a>(&'a self, mut req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if self.is_exempt(req.uri().path()) {
                return next.run(req).await;
            }

            let token = match bearer_token(req.headers()) {
                Some(token) => token.to_string(),
                None => {
                    tracing::warn!(path = %req.uri().path(), "Missing bearer token");
                    return short_circuit(self.name(), AuthError::Missing.into_response());
                }
            };

            match self.validator.validate(&token).await {
                Ok(identity) => {
                    tracing::debug!(subject = %identity.subject, "Request authenticated");
                    req.extensions_mut().insert(identity);
                    next.run(req).await
                }
                Err(reason) => {
                    tracing::warn!(path = %req.uri().path(), reason = %reason, "Token rejected");
                    short_circuit(self.name(), AuthError::Rejected(reason).into_response())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::pipeline::filter::{Pipeline, ShortCircuited};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn gate(validator: Arc<dyn TokenValidator>) -> AuthGate {
        AuthGate::new(AuthConfig::default().exempt_paths, validator)
    }

    #[test]
    fn test_default_exemptions() {
        let gate = gate(Arc::new(PresenceValidator));
        assert!(gate.is_exempt("/actuator/health"));
        assert!(gate.is_exempt("/api/auth/login"));
        assert!(gate.is_exempt("/config/app/dev"));
        assert!(!gate.is_exempt("/api/users/1"));
        assert!(!gate.is_exempt("/api/auth/login/extra"));
        assert!(!gate.is_exempt("/actuator"));
    }

    #[test]
    fn test_double_star_is_any_characters() {
        let p = ExemptionPattern::new("/actuator/**");
        assert!(p.matches("/actuator/"));
        assert!(p.matches("/actuator/health/liveness"));
        assert!(!p.matches("/api/actuator/health"));

        let inner = ExemptionPattern::new("/api/**/public");
        assert!(inner.matches("/api/v1/docs/public"));
        assert!(inner.matches("/api//public"));
        assert!(!inner.matches("/api/v1/public/x"));

        let prefix = ExemptionPattern::new("/static**");
        assert!(prefix.matches("/static-assets/app.js"));
    }

    #[test]
    fn test_bearer_prefix_is_case_sensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    async fn dispatch(gate: AuthGate, req: Request<Body>) -> (Response, bool) {
        let pipeline = Pipeline::builder().register(gate).build();
        let reached = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&reached);
        let response = pipeline
            .handle(req, move |req| async move {
                flag.store(true, Ordering::SeqCst);
                let subject = req
                    .extensions()
                    .get::<Identity>()
                    .map(|id| id.subject.clone())
                    .unwrap_or_default();
                subject.into_response()
            })
            .await;
        (response, reached.load(Ordering::SeqCst))
    }

    fn request(path: &str, auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_token_short_circuits() {
        let (response, reached) = dispatch(
            gate(Arc::new(PresenceValidator)),
            request("/api/external/weather?city=Paris", None),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.extensions().get::<ShortCircuited>().is_some());
        assert!(!reached);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_exempt_path_needs_no_token() {
        let (response, reached) =
            dispatch(gate(Arc::new(PresenceValidator)), request("/actuator/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(reached);
    }

    #[tokio::test]
    async fn test_identity_attached() {
        let tokens = HashMap::from([("t-1".to_string(), "alice".to_string())]);
        let (response, reached) = dispatch(
            gate(Arc::new(StaticTokenValidator::new(tokens))),
            request("/api/users/1", Some("Bearer t-1")),
        )
        .await;

        assert!(reached);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"alice");
    }

    #[tokio::test]
    async fn test_rejected_token_short_circuits() {
        let (response, reached) = dispatch(
            gate(Arc::new(StaticTokenValidator::default())),
            request("/api/users/1", Some("Bearer forged")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!reached);
    }
}
