//! Request adapters.
//!
//! Both the HTTP server and the event-style entry point funnel into the same
//! handlers here, so status codes and bodies are identical whichever process
//! boundary invokes them.

pub mod event;
pub mod http;

use crate::application::orders::OrderService;
use crate::domain::intent::CreateOrderRequest;
use crate::error::PaymentError;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::error;

/// Headers attached to every reply so browser clients can call either adapter.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "Content-Type"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
];

/// Status code and JSON body produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn method_not_allowed(allowed: &str) -> Self {
        Self {
            status: 405,
            body: json!({ "error": format!("Method not allowed, use {}", allowed) }),
        }
    }
}

impl From<PaymentError> for Reply {
    fn from(e: PaymentError) -> Self {
        if e.status_code() >= 500 {
            error!(kind = ?e.kind(), error = %e, "Request failed");
        }
        let mut body = json!({ "error": e.to_string() });
        if let Some(details) = e.details() {
            body["details"] = details.clone();
        }
        Self {
            status: e.status_code(),
            body,
        }
    }
}

/// Create-order handler: raw JSON body in, gateway order body out.
pub async fn create_order(service: &OrderService, body: &[u8]) -> Reply {
    let request = match CreateOrderRequest::from_json(body) {
        Ok(request) => request,
        Err(e) => return e.into(),
    };
    match service.create_order(request).await {
        Ok(order) => Reply::ok(order.raw),
        Err(e) => e.into(),
    }
}

/// Verify-order handler: reads `orderId` (or `order_id`) from the query.
pub async fn verify_order(service: &OrderService, query: &HashMap<String, String>) -> Reply {
    let order_id = query
        .get("orderId")
        .or_else(|| query.get("order_id"))
        .map(String::as_str)
        .unwrap_or_default();

    match service.verify_order(order_id).await {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(body) => Reply::ok(body),
            Err(e) => PaymentError::GatewayProtocolError(format!(
                "Failed to encode verification result: {}",
                e
            ))
            .into(),
        },
        Err(e) => e.into(),
    }
}
