//! `/api/external` route handlers.

use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::Value;

use crate::http::response::ApiResponse;
use crate::http::server::AppState;
use crate::resilience::guard::Guarded;
use crate::services::SmsDelivery;

pub const SMS_UNAVAILABLE_CODE: &str = "SMS_SERVICE_UNAVAILABLE";

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    pub city: String,
}

#[derive(Debug, Deserialize)]
pub struct SmsSendQuery {
    pub phone: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct VerificationQuery {
    pub phone: String,
}

/// `GET /api/external/weather?city=`
pub async fn weather(
    State(state): State<AppState>,
    Query(query): Query<WeatherQuery>,
) -> ApiResponse<Value> {
    let result = state.weather.current(&query.city).await;
    ApiResponse::success(result.into_inner())
}

/// `POST /api/external/sms/send?phone=&message=`
pub async fn send_sms(
    State(state): State<AppState>,
    Query(query): Query<SmsSendQuery>,
) -> ApiResponse<String> {
    sms_envelope(state.sms.send(&query.phone, &query.message).await)
}

/// `POST /api/external/sms/verification-code?phone=`
pub async fn send_verification_code(
    State(state): State<AppState>,
    Query(query): Query<VerificationQuery>,
) -> ApiResponse<String> {
    sms_envelope(state.sms.send_verification_code(&query.phone).await)
}

fn sms_envelope(result: Guarded<SmsDelivery>) -> ApiResponse<String> {
    match result.into_inner() {
        SmsDelivery::Sent(receipt) if receipt.simulated => {
            ApiResponse::success("SMS sent (simulated)".to_string())
        }
        SmsDelivery::Sent(_) => ApiResponse::success("SMS sent".to_string()),
        SmsDelivery::Unavailable => ApiResponse::error(
            SMS_UNAVAILABLE_CODE,
            "SMS service temporarily unavailable, please retry later",
        ),
    }
}
