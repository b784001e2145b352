//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the dependency services and their guards from config
//! - Create the Axum router with all handlers
//! - Wire up layers (panic safety net, request ID, filter pipeline)
//! - Serve on a listener until the shutdown future resolves

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::GatewayConfig;
use crate::http::response::panic_response;
use crate::http::{actuator, handlers};
use crate::pipeline::{pipeline_middleware, standard_pipeline, Pipeline};
use crate::resilience::{BreakerRegistry, CachePolicy, OutboundGuard, RetryPolicy};
use crate::services::{SmsService, WeatherService};
use crate::upstream::{
    build_client, HttpSmsProvider, HttpWeatherProvider, MockSmsProvider, PeerServiceClient,
    SmsProvider,
};

/// Startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid URL for {dependency}: {source}")]
    InvalidUrl {
        dependency: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unknown SMS provider '{0}'")]
    UnknownSmsProvider(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub weather: Arc<WeatherService>,
    pub sms: Arc<SmsService>,
    pub breakers: Arc<BreakerRegistry>,
    pub peers: Arc<HashMap<String, PeerServiceClient>>,
}

impl AppState {
    pub fn new(weather: WeatherService, sms: SmsService, breakers: Arc<BreakerRegistry>) -> Self {
        Self {
            weather: Arc::new(weather),
            sms: Arc::new(sms),
            breakers,
            peers: Arc::new(HashMap::new()),
        }
    }

    pub fn with_peers(mut self, peers: impl IntoIterator<Item = PeerServiceClient>) -> Self {
        let peers = peers.into_iter().map(|p| (p.name().to_string(), p)).collect();
        self.peers = Arc::new(peers);
        self
    }

    /// Guarded client for a configured peer service.
    pub fn peer(&self, name: &str) -> Option<&PeerServiceClient> {
        self.peers.get(name)
    }

    /// Wire providers and guards. Every guard shares one breaker registry.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ServerError> {
        let breakers = Arc::new(BreakerRegistry::from_config(&config.circuit_breaker));
        let client = build_client(&config.timeouts)?;
        let attempt_timeout = config.timeouts.request();

        let weather_provider =
            HttpWeatherProvider::new(client.clone(), &config.upstream.weather, attempt_timeout)
                .map_err(|source| ServerError::InvalidUrl {
                    dependency: "weather".to_string(),
                    source,
                })?;
        let weather_cache = if config.upstream.weather.cache_enabled {
            CachePolicy::from_config(&config.cache)
        } else {
            CachePolicy::disabled()
        };
        let weather = WeatherService::new(
            Arc::new(weather_provider),
            OutboundGuard::new(
                Arc::clone(&breakers),
                RetryPolicy::from_config(&config.retries),
                weather_cache,
                attempt_timeout,
            ),
        );

        let sms_provider: Arc<dyn SmsProvider> = match config.upstream.sms.provider.as_str() {
            "mock" => Arc::new(MockSmsProvider),
            "http" => Arc::new(
                HttpSmsProvider::new(client.clone(), &config.upstream.sms, attempt_timeout)
                    .map_err(|source| ServerError::InvalidUrl {
                        dependency: "sms".to_string(),
                        source,
                    })?,
            ),
            other => return Err(ServerError::UnknownSmsProvider(other.to_string())),
        };
        // Sends are not idempotent: no retries and no cache.
        let sms = SmsService::new(
            sms_provider,
            OutboundGuard::new(
                Arc::clone(&breakers),
                RetryPolicy::no_retry(),
                CachePolicy::disabled(),
                attempt_timeout,
            ),
        );

        let mut peers = Vec::with_capacity(config.upstream.peers.len());
        for (name, peer) in &config.upstream.peers {
            let cache = if peer.cache_enabled {
                CachePolicy::from_config(&config.cache)
            } else {
                CachePolicy::disabled()
            };
            let peer_client = PeerServiceClient::new(
                name.clone(),
                &peer.base_url,
                client.clone(),
                Arc::clone(&breakers),
                RetryPolicy::from_config(&config.retries),
                cache,
                attempt_timeout,
            )
            .map_err(|source| ServerError::InvalidUrl {
                dependency: name.clone(),
                source,
            })?;
            peers.push(peer_client);
        }

        tracing::info!(
            weather_cache = weather_cache.enabled,
            sms_provider = %config.upstream.sms.provider,
            peers = peers.len(),
            "Dependency services initialized"
        );
        Ok(Self::new(weather, sms, breakers).with_peers(peers))
    }
}

/// Routes plus the layer stack, outermost first: panic net, request ID, filter pipeline.
pub fn build_router(state: AppState, pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/api/external/weather", get(handlers::weather))
        .route("/api/external/sms/send", post(handlers::send_sms))
        .route(
            "/api/external/sms/verification-code",
            post(handlers::send_verification_code),
        )
        .route("/actuator/health", get(actuator::health))
        .route("/actuator/circuitbreakers", get(actuator::circuit_breakers))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::from_fn_with_state(pipeline, pipeline_middleware)),
        )
}

/// HTTP server for the edge gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let pipeline = standard_pipeline(&config.auth).build();
        Self::with_pipeline(config, pipeline)
    }

    /// Same as [`HttpServer::new`] with a caller-assembled filter pipeline.
    pub fn with_pipeline(config: GatewayConfig, pipeline: Pipeline) -> Result<Self, ServerError> {
        let state = AppState::from_config(&config)?;
        tracing::info!(filters = ?pipeline.filter_names(), "Inbound pipeline built");

        Ok(Self {
            router: build_router(state, Arc::new(pipeline)),
            config,
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until `shutdown` resolves.
    pub async fn run<S>(self, listener: TcpListener, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_sms_provider_rejected() {
        let mut config = GatewayConfig::default();
        config.upstream.sms.provider = "carrier-pigeon".into();
        assert!(matches!(
            AppState::from_config(&config),
            Err(ServerError::UnknownSmsProvider(p)) if p == "carrier-pigeon"
        ));
    }

    #[test]
    fn test_invalid_weather_url_rejected() {
        let mut config = GatewayConfig::default();
        config.upstream.weather.url = "::".into();
        assert!(matches!(
            AppState::from_config(&config),
            Err(ServerError::InvalidUrl { dependency, .. }) if dependency == "weather"
        ));
    }

    #[test]
    fn test_peers_built_from_config() {
        let mut config = GatewayConfig::default();
        config.upstream.peers.insert(
            "user-service".into(),
            crate::config::PeerConfig {
                base_url: "http://localhost:8081/api/".into(),
                cache_enabled: true,
            },
        );
        let state = AppState::from_config(&config).unwrap();
        let peer = state.peer("user-service").unwrap();
        assert_eq!(peer.base_url().as_str(), "http://localhost:8081/api/");
        assert!(state.peer("config-center").is_none());
    }
}
