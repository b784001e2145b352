//! End-to-end request logging.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::observability::metrics;
use crate::pipeline::client_ip::RequestContext;
use crate::pipeline::filter::{Filter, Next, ShortCircuited};

/// Outermost built-in filter, so its duration covers the whole chain.
pub const REQUEST_TRACE_ORDER: i32 = -200;

/// One completed exchange, as seen by [`RequestTrace`].
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub method: String,
    pub path: String,
    pub client_ip: String,
    pub status: u16,
    pub duration: Duration,
    /// Filter that answered instead of the handler, if any.
    pub short_circuited_by: Option<&'static str>,
}

impl TraceRecord {
    /// Elapsed milliseconds, saturating instead of wrapping.
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

pub type TraceObserver = Arc<dyn Fn(&TraceRecord) + Send + Sync>;

/// Logs method, path, client address, status and elapsed time for every request.
#[derive(Default)]
pub struct RequestTrace {
    observer: Option<TraceObserver>,
}

impl RequestTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also hand every record to `observer` after it is logged.
    pub fn with_observer(observer: TraceObserver) -> Self {
        Self {
            observer: Some(observer),
        }
    }
}

impl Filter for RequestTrace {
    fn name(&self) -> &'static str {
        "request_trace"
    }

    fn order(&self) -> i32 {
        REQUEST_TRACE_ORDER
    }

    fn run<'a>(&'a self, req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let started = Instant::now();
            let ctx = RequestContext::from_request(&req);
            let request_id = ctx.request_id.as_deref().unwrap_or("unknown");

            tracing::debug!(
                request_id = %request_id,
                method = %ctx.method,
                path = %ctx.path,
                client_ip = %ctx.client_ip,
                "Request started"
            );

            let response = next.run(req).await;
            let duration = started.elapsed();

            let record = TraceRecord {
                method: ctx.method.to_string(),
                path: ctx.path.clone(),
                client_ip: ctx.client_ip.clone(),
                status: response.status().as_u16(),
                duration,
                short_circuited_by: response
                    .extensions()
                    .get::<ShortCircuited>()
                    .map(|s| s.filter),
            };

            tracing::info!(
                request_id = %request_id,
                method = %record.method,
                path = %record.path,
                client_ip = %record.client_ip,
                status = record.status,
                duration_ms = record.duration_ms(),
                "Request completed"
            );
            metrics::record_request(&record.method, record.status, duration);

            if let Some(observer) = &self.observer {
                observer(&record);
            }
            response
        })
    }
}
