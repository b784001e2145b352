//! Filter capability and the ordered pipeline that drives it.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::{BoxFuture, FutureExt};

/// A unit of inbound interception.
///
/// A filter either passes the request on through [`Next::run`] or answers it
/// directly with [`short_circuit`]. `Next` is consumed by `run`, so nothing can
/// reach the rest of the chain once a filter has produced its response.
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower orders run outermost: first to see the request, last to see the response.
    fn order(&self) -> i32;

    fn run<'a>(&'a self, req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response>;
}

type Endpoint<'a> = Box<dyn FnOnce(Request<Body>) -> BoxFuture<'a, Response> + Send + 'a>;

/// Continuation over the remaining filters and the route handler.
pub struct Next<'a> {
    filters: &'a [Arc<dyn Filter>],
    endpoint: Endpoint<'a>,
}

impl<'a> Next<'a> {
    pub fn run(self, req: Request<Body>) -> BoxFuture<'a, Response> {
        match self.filters.split_first() {
            Some((filter, rest)) => filter.run(
                req,
                Next {
                    filters: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(req),
        }
    }
}

/// Marks a response produced by a filter rather than the route handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortCircuited {
    pub filter: &'static str,
}

/// Complete the exchange from inside a filter.
pub fn short_circuit(filter: &'static str, mut response: Response) -> Response {
    response.extensions_mut().insert(ShortCircuited { filter });
    response
}

/// Collects filters before traffic starts.
#[derive(Default)]
pub struct PipelineBuilder {
    filters: Vec<Arc<dyn Filter>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F: Filter + 'static>(self, filter: F) -> Self {
        self.register_shared(Arc::new(filter))
    }

    pub fn register_shared(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sort once by order; the stable sort keeps registration sequence for ties.
    pub fn build(self) -> Pipeline {
        let mut filters = self.filters;
        filters.sort_by_key(|f| f.order());
        for (position, filter) in filters.iter().enumerate() {
            tracing::debug!(position, filter = filter.name(), order = filter.order(), "Filter registered");
        }
        Pipeline { filters }
    }
}

/// Immutable, ordered filter chain.
pub struct Pipeline {
    filters: Vec<Arc<dyn Filter>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Filter names in execution order.
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Run `req` through every filter, then `endpoint`, unless a filter answers first.
    pub fn handle<'a, E, Fut>(&'a self, req: Request<Body>, endpoint: E) -> BoxFuture<'a, Response>
    where
        E: FnOnce(Request<Body>) -> Fut + Send + 'a,
        Fut: Future<Output = Response> + Send + 'a,
    {
        let next = Next {
            filters: &self.filters,
            endpoint: Box::new(move |req| endpoint(req).boxed()),
        };
        next.run(req)
    }
}
