#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use gigpay::application::orders::OrderService;
use gigpay::config::GatewayConfig;
use gigpay::infrastructure::clock::FixedClock;
use gigpay::infrastructure::in_memory::InMemoryGateway;
use serde_json::{Value, json};

pub const NOW_MILLIS: u64 = 1_700_000_000_000;

pub fn config() -> GatewayConfig {
    GatewayConfig::from_lookup(|key| match key {
        "GATEWAY_CLIENT_ID" => Some("test-app".to_string()),
        "GATEWAY_CLIENT_SECRET" => Some("test-secret".to_string()),
        "GATEWAY_API_VERSION" => Some("2023-08-01".to_string()),
        "GATEWAY_MODE" => Some("sandbox".to_string()),
        _ => None,
    })
    .expect("test configuration is complete")
}

/// Service wired to a shared in-memory gateway and a fixed clock.
pub fn service() -> (OrderService, InMemoryGateway) {
    let gateway = InMemoryGateway::new();
    let service = OrderService::new(Box::new(gateway.clone()), &config())
        .with_clock(Box::new(FixedClock(NOW_MILLIS)));
    (service, gateway)
}

/// Scenario body: a one-week subscription for user-123.
pub fn subscription_body() -> Value {
    json!({
        "subjectKind": "subscription",
        "subjectId": "1_week",
        "buyerId": "user-123",
        "amount": 270,
        "returnOrigin": "https://app.example"
    })
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
