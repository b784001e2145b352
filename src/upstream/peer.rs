//! Guarded HTTP/JSON client for peer services.
//!
//! Unlike the weather and SMS providers, a peer client owns its guards. Every
//! request runs through an [`OutboundGuard`] scoped to the peer's name, so all
//! calls to one peer share a breaker:
//!
//! ```text
//! GET / HEAD        → reads guard  (configured retries, optional cache)
//! POST / PUT / ...  → writes guard (single attempt, never cached)
//! ```
//!
//! Paths are resolved against the configured base URL and may not leave its
//! origin.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

use crate::resilience::cache::CachePolicy;
use crate::resilience::circuit_breaker::BreakerRegistry;
use crate::resilience::error::UpstreamError;
use crate::resilience::guard::{Guarded, OutboundGuard};
use crate::resilience::retries::RetryPolicy;
use crate::upstream::client::{check_status, classify_error};

/// Returned for any peer call that could not be completed.
pub fn degraded_peer_response(peer: &str) -> Value {
    json!({
        "peer": peer,
        "message": "Peer service temporarily unavailable, please retry later",
        "degraded": true,
    })
}

/// A request rejected before it reached the guard.
#[derive(Debug, Error)]
pub enum PeerRequestError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("request body is not serializable: {0}")]
    Body(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct PeerServiceClient {
    name: String,
    base_url: Url,
    http: reqwest::Client,
    request_timeout: Duration,
    reads: OutboundGuard<Value>,
    writes: OutboundGuard<Value>,
}

impl PeerServiceClient {
    /// `retry` and `cache` apply to reads only.
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        http: reqwest::Client,
        breakers: Arc<BreakerRegistry>,
        retry: RetryPolicy,
        cache: CachePolicy,
        request_timeout: Duration,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            name: name.into(),
            base_url: Url::parse(base_url)?,
            http,
            request_timeout,
            reads: OutboundGuard::new(Arc::clone(&breakers), retry, cache, request_timeout),
            writes: OutboundGuard::new(
                breakers,
                RetryPolicy::no_retry(),
                CachePolicy::disabled(),
                request_timeout,
            ),
        })
    }

    /// Dependency name, also the breaker scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Guarded<Value>, PeerRequestError> {
        let mut url = self.resolve(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(self.dispatch(Method::GET, url, None).await)
    }

    pub async fn post<B>(&self, path: &str, body: &B) -> Result<Guarded<Value>, PeerRequestError>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        let url = self.resolve(path)?;
        Ok(self.dispatch(Method::POST, url, Some(body)).await)
    }

    /// Any method. GET and HEAD go through the reads guard, the rest are
    /// treated as writes.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Guarded<Value>, PeerRequestError> {
        let url = self.resolve(path)?;
        Ok(self.dispatch(method, url, body).await)
    }

    /// Join `path` onto the base URL, refusing anything that lands on another origin.
    pub fn resolve(&self, path: &str) -> Result<Url, PeerRequestError> {
        let invalid = |reason: &str| PeerRequestError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| invalid(&e.to_string()))?;
        if url.origin() != self.base_url.origin() {
            return Err(invalid("leaves the peer's origin"));
        }
        Ok(url)
    }

    async fn dispatch(&self, method: Method, url: Url, body: Option<Value>) -> Guarded<Value> {
        let guard = if method == Method::GET || method == Method::HEAD {
            &self.reads
        } else {
            &self.writes
        };
        let key = format!("{method} {url}");
        let peer = self.name.as_str();

        let (method, url, body) = (&method, &url, body.as_ref());
        let result = guard
            .call(
                peer,
                &key,
                move || self.execute(method.clone(), url.clone(), body),
                move |_key: &str| degraded_peer_response(peer),
            )
            .await;

        if let Guarded::Degraded { reason, .. } = &result {
            tracing::warn!(peer, request = %key, reason = ?reason, "Peer call degraded");
        }
        result
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Value, UpstreamError> {
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| classify_error(&e, self.request_timeout))?;

        let response = check_status(response).await?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_error(&e, self.request_timeout))?;

        tracing::debug!(
            peer = %self.name,
            %method,
            %url,
            status = status.as_u16(),
            "Peer call succeeded"
        );
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| UpstreamError::Permanent(format!("peer returned invalid JSON: {e}")))
    }
}
