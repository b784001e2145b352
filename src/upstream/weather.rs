//! Weather provider.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use url::Url;

use crate::config::WeatherConfig;
use crate::resilience::error::UpstreamError;
use crate::upstream::client::{check_status, classify_error};

/// Current conditions for a city, as the provider's JSON document.
pub trait WeatherProvider: Send + Sync {
    fn current<'a>(&'a self, city: &'a str) -> BoxFuture<'a, Result<Value, UpstreamError>>;
}

/// OpenWeatherMap-style HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpWeatherProvider {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    request_timeout: Duration,
}

impl HttpWeatherProvider {
    pub fn new(
        client: reqwest::Client,
        config: &WeatherConfig,
        request_timeout: Duration,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            endpoint: Url::parse(&config.url)?,
            api_key: config.api_key.clone(),
            request_timeout,
        })
    }

    /// `<endpoint>?q=<city>&appid=<key>&units=metric`
    pub fn request_url(&self, city: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", city)
            .append_pair("appid", &self.api_key)
            .append_pair("units", "metric");
        url
    }

    async fn fetch(&self, city: &str) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .get(self.request_url(city))
            .send()
            .await
            .map_err(|e| classify_error(&e, self.request_timeout))?;

        let payload = check_status(response)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| classify_error(&e, self.request_timeout))?;

        tracing::info!(city, "Weather lookup succeeded");
        Ok(payload)
    }
}

impl WeatherProvider for HttpWeatherProvider {
    fn current<'a>(&'a self, city: &'a str) -> BoxFuture<'a, Result<Value, UpstreamError>> {
        Box::pin(self.fetch(city))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url_encodes_city() {
        let config = WeatherConfig {
            url: "http://weather.local/data/2.5/weather".to_string(),
            api_key: "k&1".to_string(),
            cache_enabled: true,
        };
        let provider =
            HttpWeatherProvider::new(reqwest::Client::new(), &config, Duration::from_secs(10)).unwrap();

        let url = provider.request_url("São Paulo");
        assert_eq!(url.path(), "/data/2.5/weather");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "São Paulo".to_string()),
                ("appid".to_string(), "k&1".to_string()),
                ("units".to_string(), "metric".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = WeatherConfig {
            url: "not a url".to_string(),
            ..WeatherConfig::default()
        };
        assert!(HttpWeatherProvider::new(reqwest::Client::new(), &config, Duration::from_secs(1)).is_err());
    }
}
