use super::intent::{Amount, PurchaseIntent, PurchaseKind};
use super::status::GatewayStatus;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

const ORDER_ID_PREFIX: &str = "order_";
/// Longest order id the gateway accepts.
const MAX_ORDER_ID_LEN: usize = 50;
/// Placeholder the gateway substitutes with the real order id on redirect.
pub const ORDER_ID_PLACEHOLDER: &str = "{order_id}";

pub const TAG_TYPE: &str = "type";
pub const TAG_SUBJECT_ID: &str = "subject_id";

/// Gateway order identifier, `order_<buyer prefix>_<epoch millis>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generates the identifier for a new purchase attempt.
    ///
    /// The prefix is the first `-`/`_`-separated token of the buyer id, reduced
    /// to ASCII alphanumerics. The same buyer and timestamp always yield the
    /// same identifier.
    ///
    /// # Arguments
    ///
    /// * `buyer_id` - The buyer starting the purchase.
    /// * `epoch_millis` - Milliseconds since the Unix epoch at creation time.
    pub fn generate(buyer_id: &str, epoch_millis: u64) -> Self {
        let prefix: String = buyer_id
            .split(['-', '_'])
            .find(|token| !token.is_empty())
            .unwrap_or("buyer")
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(20)
            .collect();
        let prefix = if prefix.is_empty() {
            "buyer".to_string()
        } else {
            prefix
        };
        Self(format!("{}{}_{}", ORDER_ID_PREFIX, prefix, epoch_millis))
    }

    /// Accepts an identifier supplied by a caller, e.g. when retrying a creation.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PaymentError::ValidationError(
                "Missing order_id".to_string(),
            ));
        }
        if raw.len() > MAX_ORDER_ID_LEN
            || !raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            return Err(PaymentError::ValidationError(format!(
                "Invalid order_id '{}'",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Like [`OrderId::parse`], but also requires the locally minted format.
    pub fn parse_own(raw: &str) -> Result<Self> {
        let id = Self::parse(raw)?;
        if !id.0.starts_with(ORDER_ID_PREFIX) {
            return Err(PaymentError::ValidationError(format!(
                "order_id '{}' was not issued by this service",
                id.0
            )));
        }
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerDetails {
    pub customer_id: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub customer_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderMeta {
    pub return_url: String,
}

/// Order creation payload in the gateway's wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub order_id: OrderId,
    pub order_amount: Amount,
    pub order_currency: String,
    pub customer_details: CustomerDetails,
    pub order_meta: OrderMeta,
    pub order_note: String,
    pub order_tags: BTreeMap<String, String>,
}

impl OrderRequest {
    /// Maps a validated intent onto the gateway payload.
    ///
    /// The return URL and note branch on the purchase kind so the client can
    /// resume the right flow after the redirect. The tags carry the kind and
    /// subject id back on every fetch of the order.
    pub fn build(intent: &PurchaseIntent, order_id: OrderId, currency: &str) -> Self {
        let return_url = format!(
            "{}{}?order_id={}&{}={}",
            intent.return_origin,
            intent.kind.success_path(),
            ORDER_ID_PLACEHOLDER,
            intent.kind.subject_param(),
            intent.subject_id
        );

        let order_note = match intent.kind {
            PurchaseKind::Subscription => format!("Subscription plan {}", intent.subject_id),
            PurchaseKind::Product => format!("Marketplace product {}", intent.subject_id),
        };

        let mut order_tags = BTreeMap::new();
        order_tags.insert(TAG_TYPE.to_string(), intent.kind.as_str().to_string());
        order_tags.insert(TAG_SUBJECT_ID.to_string(), intent.subject_id.clone());

        Self {
            order_id,
            order_amount: intent.amount,
            order_currency: currency.to_string(),
            customer_details: CustomerDetails {
                customer_id: intent.buyer_id.clone(),
                customer_phone: intent.contact.phone.clone(),
                customer_email: intent.contact.email.clone(),
                customer_name: intent.contact.display_name.clone(),
            },
            order_meta: OrderMeta { return_url },
            order_note,
            order_tags,
        }
    }
}

/// Order fields read back from the gateway.
#[derive(Debug, Deserialize)]
struct OrderBody {
    order_id: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    order_amount: Decimal,
    order_currency: String,
    order_status: GatewayStatus,
    #[serde(default)]
    order_tags: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    payment_session_id: Option<String>,
    #[serde(default)]
    settled: Option<bool>,
}

/// An order as the gateway reports it. Status is only ever read, never set.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOrder {
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: GatewayStatus,
    pub settled: bool,
    pub tags: BTreeMap<String, String>,
    pub payment_session_id: Option<String>,
    /// The untouched response body.
    pub raw: Value,
}

impl GatewayOrder {
    /// Structurally decodes a gateway order response.
    pub fn from_raw(raw: Value) -> Result<Self> {
        let body: OrderBody = serde_json::from_value(raw.clone()).map_err(|e| {
            PaymentError::GatewayProtocolError(format!("Malformed order body: {}", e))
        })?;

        // Tag values are strings on the wire, but tolerate scalars.
        let tags = body
            .order_tags
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                Value::Null => None,
                other => Some((k, other.to_string())),
            })
            .collect();

        Ok(Self {
            order_id: body.order_id,
            amount: body.order_amount,
            currency: body.order_currency,
            status: body.order_status,
            settled: body.settled.unwrap_or(false),
            tags,
            payment_session_id: body.payment_session_id,
            raw,
        })
    }

    /// Recovers the purchase kind and subject id from the echoed tags.
    pub fn subject(&self) -> Result<(PurchaseKind, String)> {
        let kind = self
            .tags
            .get(TAG_TYPE)
            .and_then(|raw| PurchaseKind::parse(raw))
            .ok_or_else(|| {
                PaymentError::GatewayProtocolError(format!(
                    "Order {} carries no recognisable '{}' tag",
                    self.order_id, TAG_TYPE
                ))
            })?;
        let subject_id = self
            .tags
            .get(TAG_SUBJECT_ID)
            .filter(|s| !s.is_empty())
            .cloned()
            .ok_or_else(|| {
                PaymentError::GatewayProtocolError(format!(
                    "Order {} carries no '{}' tag",
                    self.order_id, TAG_SUBJECT_ID
                ))
            })?;
        Ok((kind, subject_id))
    }
}
