//! Event adapter for serverless-style invocation.
//!
//! One JSON event describing an HTTP call comes in, one JSON envelope with the
//! status code, headers and serialized body goes out.

use super::{CORS_HEADERS, Reply};
use crate::application::orders::OrderService;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Which order operation an invocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    CreateOrder,
    VerifyOrder,
}

impl Function {
    fn method(&self) -> &'static str {
        match self {
            Function::CreateOrder => "POST",
            Function::VerifyOrder => "GET",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub http_method: String,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl From<Reply> for EventResponse {
    fn from(reply: Reply) -> Self {
        let mut headers = cors_headers();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code: reply.status,
            headers,
            body: reply.body.to_string(),
        }
    }
}

fn cors_headers() -> BTreeMap<String, String> {
    CORS_HEADERS
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Dispatches one event to the order handlers.
pub async fn handle(service: &OrderService, function: Function, event: Event) -> EventResponse {
    let method = event.http_method.trim().to_ascii_uppercase();
    debug!(?function, method = %method, "Handling event");

    if method == "OPTIONS" {
        return EventResponse {
            status_code: 204,
            headers: cors_headers(),
            body: String::new(),
        };
    }
    if method != function.method() {
        return Reply::method_not_allowed(function.method()).into();
    }

    let reply = match function {
        Function::CreateOrder => {
            let body = event.body.unwrap_or_default();
            super::create_order(service, body.as_bytes()).await
        }
        Function::VerifyOrder => {
            let query = event.query_string_parameters.unwrap_or_default();
            super::verify_order(service, &query).await
        }
    };
    reply.into()
}

/// Parses a raw JSON event and dispatches it. A malformed event is a 400.
pub async fn handle_json(service: &OrderService, function: Function, raw: &str) -> EventResponse {
    match serde_json::from_str::<Event>(raw) {
        Ok(event) => handle(service, function, event).await,
        Err(e) => Reply::bad_request(format!("Invalid event: {}", e)).into(),
    }
}
