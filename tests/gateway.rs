//! Router-level tests: the full layer stack driven with `oneshot`.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures_util::future::BoxFuture;
use serde_json::Value;
use tower::ServiceExt;

use common::{start_mock_backend, start_programmable_backend, test_config, unused_addr, TOKEN};
use edge_gateway::config::GatewayConfig;
use edge_gateway::http::HttpServer;
use edge_gateway::pipeline::{Filter, Next, Pipeline};

fn router(config: GatewayConfig) -> Router {
    HttpServer::new(config).unwrap().router()
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, auth)
}

fn request(method: Method, uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = auth {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_weather_requires_bearer_token() {
    let upstream = start_mock_backend(r#"{"name":"Paris"}"#).await;
    let app = router(test_config(&upstream.url("/weather")));

    let response = app.oneshot(get("/api/external/weather?city=Paris", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let request_id = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert!(body.is_empty());
    assert_eq!(upstream.hits(), 0);
}

#[tokio::test]
async fn test_weather_passes_through_and_caches() {
    let upstream = start_mock_backend(r#"{"name":"Paris","main":{"temp":21.5}}"#).await;
    let app = router(test_config(&upstream.url("/data/2.5/weather")));

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(get("/api/external/weather?city=Paris", Some(TOKEN)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let envelope = json(response).await;
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["code"], "SUCCESS");
        assert_eq!(envelope["data"]["main"]["temp"], 21.5);
    }

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(
        requests[0].target,
        "/data/2.5/weather?q=Paris&appid=test-key&units=metric"
    );
}

#[tokio::test]
async fn test_transient_failures_retried_then_degraded() {
    let upstream =
        start_programmable_backend(|_req| async { (503, "maintenance".to_string()) }).await;
    let app = router(test_config(&upstream.url("/weather")));

    let response = app
        .oneshot(get("/api/external/weather?city=Oslo", Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let envelope = json(response).await;
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["data"]["city"], "Oslo");
    assert_eq!(envelope["data"]["temperature"], "N/A");
    assert_eq!(envelope["data"]["degraded"], true);
    assert_eq!(upstream.hits(), 2);
}

#[tokio::test]
async fn test_permanent_failure_not_retried() {
    let upstream =
        start_programmable_backend(|_req| async { (404, r#"{"message":"city not found"}"#.to_string()) })
            .await;
    let app = router(test_config(&upstream.url("/weather")));

    let envelope = json(
        app.oneshot(get("/api/external/weather?city=Atlantis", Some(TOKEN)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(envelope["data"]["degraded"], true);
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_breaker_opens_and_is_reported() {
    let upstream =
        start_programmable_backend(|_req| async { (500, "boom".to_string()) }).await;
    let mut config = test_config(&upstream.url("/weather"));
    config.retries.max_attempts = 1;
    let app = router(config);

    for city in ["A", "B", "C"] {
        let response = app
            .clone()
            .oneshot(get(&format!("/api/external/weather?city={city}"), Some(TOKEN)))
            .await
            .unwrap();
        assert_eq!(json(response).await["data"]["degraded"], true);
    }
    // Third call was rejected by the open breaker without reaching the upstream.
    assert_eq!(upstream.hits(), 2);

    let response = app
        .oneshot(get("/actuator/circuitbreakers", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let breakers = json(response).await;
    let weather = breakers
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["name"] == "weather-service")
        .unwrap();
    assert_eq!(weather["state"], "OPEN");
    assert_eq!(weather["failureCount"], 2);
}

#[tokio::test]
async fn test_health_is_exempt() {
    let app = router(test_config(&format!("http://{}/", unused_addr())));
    let response = app.oneshot(get("/actuator/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await, serde_json::json!({"status": "UP"}));
}

#[tokio::test]
async fn test_unknown_paths_still_gated() {
    let app = router(test_config(&format!("http://{}/", unused_addr())));

    let response = app.clone().oneshot(get("/api/users/1", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(get("/api/users/1", Some(TOKEN))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_tokens_reject_unknown() {
    let mut config = test_config(&format!("http://{}/", unused_addr()));
    config
        .auth
        .static_tokens
        .insert("known".to_string(), "svc-a".to_string());
    let app = router(config);

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/external/sms/send?phone=1&message=hi", Some("Bearer other")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(request(Method::POST, "/api/external/sms/send?phone=1&message=hi", Some("Bearer known")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_mock_sms_send() {
    let app = router(test_config(&format!("http://{}/", unused_addr())));
    let response = app
        .oneshot(request(
            Method::POST,
            "/api/external/sms/send?phone=13800000000&message=hello",
            Some(TOKEN),
        ))
        .await
        .unwrap();

    let envelope = json(response).await;
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["data"], "SMS sent (simulated)");
}

#[tokio::test]
async fn test_http_sms_failure_maps_to_unavailable_envelope() {
    let sms = start_programmable_backend(|_req| async { (502, "bad gateway".to_string()) }).await;
    let mut config = test_config(&format!("http://{}/", unused_addr()));
    config.upstream.sms.provider = "http".to_string();
    config.upstream.sms.url = sms.url("/send");
    config.upstream.sms.api_key = "sms-key".to_string();
    let app = router(config);

    let response = app
        .oneshot(request(
            Method::POST,
            "/api/external/sms/verification-code?phone=13800000000",
            Some(TOKEN),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let envelope = json(response).await;
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["code"], "SMS_SERVICE_UNAVAILABLE");
    assert_eq!(envelope["data"], Value::Null);

    // Sends are never retried.
    let requests = sms.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].header("authorization"), Some("Bearer sms-key"));

    let sent: Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(sent["phone"], "13800000000");
    let code: String = sent["message"]
        .as_str()
        .unwrap()
        .chars()
        .filter(char::is_ascii_digit)
        .take(6)
        .collect();
    assert_eq!(code.len(), 6);
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let app = router(test_config(&format!("http://{}/", unused_addr())));
    let req = Request::builder()
        .uri("/actuator/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

struct Exploding {
    reached: Arc<AtomicU32>,
}

impl Filter for Exploding {
    fn name(&self) -> &'static str {
        "exploding"
    }

    fn order(&self) -> i32 {
        0
    }

    fn run<'a>(&'a self, req: Request<Body>, next: Next<'a>) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if self.reached.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("filter defect");
            }
            next.run(req).await
        })
    }
}

#[tokio::test]
async fn test_panic_becomes_internal_error_envelope() {
    let reached = Arc::new(AtomicU32::new(0));
    let pipeline = Pipeline::builder()
        .register(Exploding {
            reached: Arc::clone(&reached),
        })
        .build();
    let app = HttpServer::with_pipeline(
        test_config(&format!("http://{}/", unused_addr())),
        pipeline,
    )
    .unwrap()
    .router();

    let response = app.oneshot(get("/actuator/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let envelope = json(response).await;
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["code"], "INTERNAL_ERROR");
    assert_eq!(reached.load(Ordering::SeqCst), 1);
}
