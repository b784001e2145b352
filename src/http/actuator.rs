//! Operational endpoints under `/actuator`.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::http::server::AppState;
use crate::resilience::BreakerSnapshot;

/// `GET /actuator/health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "UP" }))
}

/// `GET /actuator/circuitbreakers`: every breaker created so far, by name.
pub async fn circuit_breakers(State(state): State<AppState>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.breakers.snapshots())
}
