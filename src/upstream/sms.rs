//! SMS providers.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::SmsConfig;
use crate::resilience::error::UpstreamError;
use crate::upstream::client::{check_status, classify_error};

/// Accepted delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsReceipt {
    pub provider: &'static str,
    /// The message was logged, not sent.
    pub simulated: bool,
    pub message_id: Option<String>,
}

pub trait SmsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn send<'a>(
        &'a self,
        phone: &'a str,
        message: &'a str,
    ) -> BoxFuture<'a, Result<SmsReceipt, UpstreamError>>;
}

/// Logs instead of sending.
#[derive(Debug, Clone, Default)]
pub struct MockSmsProvider;

impl SmsProvider for MockSmsProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn send<'a>(
        &'a self,
        phone: &'a str,
        message: &'a str,
    ) -> BoxFuture<'a, Result<SmsReceipt, UpstreamError>> {
        Box::pin(async move {
            tracing::info!(phone, chars = message.chars().count(), "Simulated SMS send");
            Ok(SmsReceipt {
                provider: self.name(),
                simulated: true,
                message_id: None,
            })
        })
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    phone: &'a str,
    message: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    #[serde(alias = "id")]
    message_id: Option<String>,
}

/// POSTs `{phone, message}` JSON with a bearer API key.
#[derive(Debug, Clone)]
pub struct HttpSmsProvider {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    request_timeout: Duration,
}

impl HttpSmsProvider {
    pub fn new(
        client: reqwest::Client,
        config: &SmsConfig,
        request_timeout: Duration,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            endpoint: Url::parse(&config.url)?,
            api_key: config.api_key.clone(),
            request_timeout,
        })
    }

    async fn post(&self, phone: &str, message: &str) -> Result<SmsReceipt, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&SendRequest { phone, message })
            .send()
            .await
            .map_err(|e| classify_error(&e, self.request_timeout))?;

        let body = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(|e| classify_error(&e, self.request_timeout))?;
        // Providers that answer with an empty or non-JSON body still accepted the message.
        let parsed: SendResponse = serde_json::from_slice(&body).unwrap_or_default();

        tracing::info!(phone, message_id = ?parsed.message_id, "SMS accepted by provider");
        Ok(SmsReceipt {
            provider: self.name(),
            simulated: false,
            message_id: parsed.message_id,
        })
    }
}

impl SmsProvider for HttpSmsProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    fn send<'a>(
        &'a self,
        phone: &'a str,
        message: &'a str,
    ) -> BoxFuture<'a, Result<SmsReceipt, UpstreamError>> {
        Box::pin(self.post(phone, message))
    }
}
