//! Guarded weather lookups.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::resilience::guard::{Guarded, OutboundGuard};
use crate::upstream::weather::WeatherProvider;

/// Breaker and cache scope for the weather provider.
pub const WEATHER_DEPENDENCY: &str = "weather-service";

/// Payload served when the provider cannot be used.
pub fn degraded_weather(city: &str) -> Value {
    json!({
        "city": city,
        "message": "Weather service temporarily unavailable, please retry later",
        "temperature": "N/A",
        "degraded": true,
    })
}

pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    guard: OutboundGuard<Value>,
}

impl WeatherService {
    pub fn new(provider: Arc<dyn WeatherProvider>, guard: OutboundGuard<Value>) -> Self {
        Self { provider, guard }
    }

    /// Current weather for `city`, cached per city while the cache policy allows.
    pub async fn current(&self, city: &str) -> Guarded<Value> {
        let provider = self.provider.as_ref();
        let result = self
            .guard
            .call(WEATHER_DEPENDENCY, city, move || provider.current(city), degraded_weather)
            .await;

        if let Guarded::Degraded { reason, .. } = &result {
            tracing::warn!(city, reason = ?reason, "Serving degraded weather");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{
        BreakerRegistry, BreakerSettings, CachePolicy, CircuitState, RetryPolicy, UpstreamError,
    };
    use futures_util::future::BoxFuture;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Scripted {
        calls: AtomicU32,
        fail: bool,
    }

    impl WeatherProvider for Scripted {
        fn current<'a>(&'a self, city: &'a str) -> BoxFuture<'a, Result<Value, UpstreamError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.fail {
                    Err(UpstreamError::Transient("connection refused".into()))
                } else {
                    Ok(json!({ "name": city, "main": { "temp": 18.5 } }))
                }
            })
        }
    }

    fn service(fail: bool, cache: CachePolicy) -> (WeatherService, Arc<Scripted>) {
        let provider = Arc::new(Scripted {
            calls: AtomicU32::new(0),
            fail,
        });
        let registry = BreakerRegistry::new(BreakerSettings::new(2, Duration::from_secs(60)));
        let guard = OutboundGuard::new(
            Arc::new(registry),
            RetryPolicy::no_retry(),
            cache,
            Duration::from_secs(10),
        );
        (WeatherService::new(provider.clone(), guard), provider)
    }

    #[tokio::test]
    async fn test_second_lookup_served_from_cache() {
        let (svc, provider) = service(false, CachePolicy::unbounded());
        let first = svc.current("Paris").await;
        let second = svc.current("Paris").await;

        assert!(matches!(first, Guarded::Fresh(_)));
        assert!(matches!(second, Guarded::Cached(_)));
        assert_eq!(first.value(), second.value());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_degrade_then_open_breaker() {
        let (svc, provider) = service(true, CachePolicy::disabled());
        for _ in 0..3 {
            let result = svc.current("Oslo").await;
            assert!(result.is_degraded());
            assert_eq!(result.value()["temperature"], "N/A");
            assert_eq!(result.value()["city"], "Oslo");
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            svc.guard.breakers().get(WEATHER_DEPENDENCY).state(),
            CircuitState::Open
        );
    }

    #[test]
    fn test_degraded_payload_is_marked() {
        let payload = degraded_weather("Lima");
        assert_eq!(payload["degraded"], true);
        assert_eq!(payload["city"], "Lima");
    }
}
