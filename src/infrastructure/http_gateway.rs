//! Gateway client speaking the payment gateway's REST API over HTTPS.

use crate::config::GatewayConfig;
use crate::domain::order::{GatewayOrder, OrderId, OrderRequest};
use crate::domain::ports::GatewayClient;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

const HEADER_CLIENT_ID: &str = "x-client-id";
const HEADER_CLIENT_SECRET: &str = "x-client-secret";
const HEADER_API_VERSION: &str = "x-api-version";

/// Gateway error code for an order id that is already taken.
const DUPLICATE_ORDER_CODE: &str = "order_already_exists";

/// `reqwest`-backed [`GatewayClient`].
///
/// Credentials are attached as default headers when the client is built, so a
/// bad credential value fails construction rather than a request.
#[derive(Clone)]
pub struct HttpGatewayClient {
    client: Client,
    base_url: String,
}

impl HttpGatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (HEADER_CLIENT_ID, &config.client_id),
            (HEADER_CLIENT_SECRET, &config.client_secret),
            (HEADER_API_VERSION, &config.api_version),
        ] {
            let mut value = HeaderValue::from_str(value).map_err(|_| {
                PaymentError::ConfigurationError(format!(
                    "Value for header {} contains invalid characters",
                    name
                ))
            })?;
            value.set_sensitive(name == HEADER_CLIENT_SECRET);
            headers.insert(HeaderName::from_static(name), value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                PaymentError::ConfigurationError(format!("Failed to create HTTP client: {}", e))
            })?;

        let base_url = config.base_url();
        debug!(base_url = %base_url, mode = ?config.mode, "Gateway client initialized");

        Ok(Self { client, base_url })
    }

    async fn send(&self, request: RequestBuilder, order_id: &str) -> Result<Value> {
        let response = request.send().await.map_err(|e| {
            warn!(order_id, error = %e, "Gateway request failed");
            PaymentError::GatewayUnavailable(describe_transport_error(&e))
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            warn!(order_id, error = %e, "Failed to read gateway response");
            PaymentError::GatewayUnavailable(describe_transport_error(&e))
        })?;

        interpret_response(status, &body, order_id)
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder> {
        let url = format!("{}/orders", self.base_url);
        let order_id = request.order_id.as_str();
        let raw = self
            .send(self.client.post(url).json(request), order_id)
            .await?;
        decode_order(raw, order_id)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<GatewayOrder> {
        let url = format!("{}/orders/{}", self.base_url, order_id);
        let raw = self.send(self.client.get(url), order_id.as_str()).await?;
        decode_order(raw, order_id.as_str())
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "could not connect to the gateway".to_string()
    } else {
        e.to_string()
    }
}

fn decode_order(raw: Value, order_id: &str) -> Result<GatewayOrder> {
    GatewayOrder::from_raw(raw.clone()).inspect_err(|e| {
        error!(order_id, error = %e, payload = %raw, "Gateway response did not match the order contract");
    })
}

/// Classifies a gateway HTTP response.
///
/// Success bodies must be JSON. A non-success with a readable JSON body is a
/// rejection; a 5xx or an unreadable body is treated as the gateway being
/// unavailable.
pub(crate) fn interpret_response(status: StatusCode, body: &[u8], order_id: &str) -> Result<Value> {
    let parsed = serde_json::from_slice::<Value>(body).ok();
    let payload = String::from_utf8_lossy(body);

    if status.is_success() {
        return parsed.ok_or_else(|| {
            error!(order_id, %status, payload = %payload, "Gateway returned a non-JSON success body");
            PaymentError::GatewayProtocolError(format!(
                "Gateway returned a non-JSON body with status {}",
                status
            ))
        });
    }

    if status.is_server_error() {
        warn!(order_id, %status, payload = %payload, "Gateway server error");
        return Err(PaymentError::GatewayUnavailable(format!(
            "gateway responded with status {}",
            status
        )));
    }

    let Some(details) = parsed else {
        warn!(order_id, %status, payload = %payload, "Gateway error without a readable body");
        return Err(PaymentError::GatewayUnavailable(format!(
            "gateway responded with status {} and an unreadable body",
            status
        )));
    };
    let code = details
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string);
    // A readable body is a refusal even without `message`.
    let message = details
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| code.clone())
        .unwrap_or_else(|| format!("gateway responded with status {}", status));

    warn!(order_id, %status, payload = %payload, "Gateway rejected the request");

    if status == StatusCode::CONFLICT || code.as_deref() == Some(DUPLICATE_ORDER_CODE) {
        return Err(PaymentError::DuplicateOrder(order_id.to_string()));
    }

    Err(PaymentError::GatewayRejected {
        code,
        message,
        details,
    })
}
