//! Guarded SMS delivery.

use std::sync::Arc;

use rand::Rng;

use crate::resilience::guard::{Guarded, OutboundGuard};
use crate::upstream::sms::{SmsProvider, SmsReceipt};

/// Breaker scope for the SMS provider.
pub const SMS_DEPENDENCY: &str = "sms-service";

/// What became of a send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmsDelivery {
    Sent(SmsReceipt),
    /// The provider was skipped or failed; nothing was delivered.
    Unavailable,
}

fn unavailable(_phone: &str) -> SmsDelivery {
    SmsDelivery::Unavailable
}

/// Six-digit code; the range keeps the leading digit non-zero.
pub fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub fn verification_message(code: &str) -> String {
    format!("Your verification code is: {code}, valid for 5 minutes")
}

pub struct SmsService {
    provider: Arc<dyn SmsProvider>,
    guard: OutboundGuard<SmsDelivery>,
}

impl SmsService {
    /// `guard` should not cache: a hit would report a send that never happened.
    pub fn new(provider: Arc<dyn SmsProvider>, guard: OutboundGuard<SmsDelivery>) -> Self {
        Self { provider, guard }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn send(&self, phone: &str, message: &str) -> Guarded<SmsDelivery> {
        let provider = self.provider.as_ref();
        let result = self
            .guard
            .call(
                SMS_DEPENDENCY,
                phone,
                move || async move { provider.send(phone, message).await.map(SmsDelivery::Sent) },
                unavailable,
            )
            .await;

        if let Guarded::Degraded { reason, .. } = &result {
            tracing::warn!(phone, reason = ?reason, "SMS delivery degraded");
        }
        result
    }

    pub async fn send_verification_code(&self, phone: &str) -> Guarded<SmsDelivery> {
        let code = generate_verification_code();
        self.send(phone, &verification_message(&code)).await
    }
}
