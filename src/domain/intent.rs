use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest currency unit the gateway settles in (paise for INR).
const MINOR_UNIT_SCALE: u32 = 2;

const DEFAULT_PHONE: &str = "9999999999";
const DEFAULT_EMAIL: &str = "customer@example.com";
const DEFAULT_NAME: &str = "Customer";

/// What a purchase pays for.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseKind {
    #[serde(alias = "plan")]
    Subscription,
    #[serde(alias = "marketplace")]
    Product,
}

impl PurchaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseKind::Subscription => "subscription",
            PurchaseKind::Product => "product",
        }
    }

    /// Query parameter carrying the subject id on the post-payment redirect.
    pub fn subject_param(&self) -> &'static str {
        match self {
            PurchaseKind::Subscription => "plan_id",
            PurchaseKind::Product => "product_id",
        }
    }

    /// Client route that resumes the flow after the gateway redirect.
    pub fn success_path(&self) -> &'static str {
        match self {
            PurchaseKind::Subscription => "/subscription/success",
            PurchaseKind::Product => "/marketplace/success",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "subscription" | "plan" => Some(Self::Subscription),
            "product" | "marketplace" => Some(Self::Product),
            _ => None,
        }
    }
}

impl fmt::Display for PurchaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a positive monetary amount in the settlement currency.
///
/// Amounts keep their exact decimal value; anything finer than the currency's
/// minor unit is rejected instead of rounded.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Amount(#[serde(with = "rust_decimal::serde::arbitrary_precision")] Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }
        if value.normalize().scale() > MINOR_UNIT_SCALE {
            return Err(PaymentError::ValidationError(format!(
                "Amount {} has more than {} decimal places",
                value, MINOR_UNIT_SCALE
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Buyer contact details sent to the gateway.
///
/// The gateway refuses orders with blank contact fields, so every field has a
/// placeholder used when the caller supplies nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyerContact {
    pub email: String,
    pub phone: String,
    pub display_name: String,
}

impl BuyerContact {
    pub fn with_defaults(
        email: Option<String>,
        phone: Option<String>,
        display_name: Option<String>,
    ) -> Self {
        fn or_default(value: Option<String>, default: &str) -> String {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        }

        Self {
            email: or_default(email, DEFAULT_EMAIL),
            phone: or_default(phone, DEFAULT_PHONE),
            display_name: or_default(display_name, DEFAULT_NAME),
        }
    }
}

impl Default for BuyerContact {
    fn default() -> Self {
        Self::with_defaults(None, None, None)
    }
}

/// A caller's request to pay for a subscription plan or a marketplace product.
///
/// Only constructible through [`PurchaseIntent::new`], which enforces every
/// invariant before anything reaches the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseIntent {
    pub kind: PurchaseKind,
    pub subject_id: String,
    pub buyer_id: String,
    pub amount: Amount,
    pub contact: BuyerContact,
    pub return_origin: String,
}

impl PurchaseIntent {
    pub fn new(
        kind: PurchaseKind,
        subject_id: impl Into<String>,
        buyer_id: impl Into<String>,
        amount: Decimal,
        contact: BuyerContact,
        return_origin: impl Into<String>,
    ) -> Result<Self> {
        let subject_id = subject_id.into().trim().to_string();
        let buyer_id = buyer_id.into().trim().to_string();
        let return_origin = return_origin.into().trim().trim_end_matches('/').to_string();

        if buyer_id.is_empty() {
            return Err(PaymentError::ValidationError(
                "buyerId is required".to_string(),
            ));
        }
        validate_subject_id(kind, &subject_id)?;
        let amount = Amount::new(amount)?;
        validate_origin(&return_origin)?;

        Ok(Self {
            kind,
            subject_id,
            buyer_id,
            amount,
            contact,
            return_origin,
        })
    }
}

fn validate_subject_id(kind: PurchaseKind, subject_id: &str) -> Result<()> {
    if subject_id.is_empty() {
        return Err(PaymentError::ValidationError(format!(
            "{} is required for a {} purchase",
            kind.subject_param(),
            kind
        )));
    }
    // Embedded verbatim in the return URL.
    if !subject_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(PaymentError::ValidationError(format!(
            "{} contains unsupported characters",
            kind.subject_param()
        )));
    }
    Ok(())
}

fn validate_origin(origin: &str) -> Result<()> {
    if origin.is_empty() {
        return Err(PaymentError::ValidationError(
            "returnOrigin is required".to_string(),
        ));
    }
    let parsed = reqwest::Url::parse(origin).map_err(|e| {
        PaymentError::ValidationError(format!("returnOrigin is not a valid URL: {}", e))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(PaymentError::ValidationError(
            "returnOrigin must be an http(s) URL".to_string(),
        ));
    }
    Ok(())
}

/// JSON body of a create-order call, as sent by the client application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub subject_kind: Option<String>,
    pub subject_id: Option<String>,
    pub plan_id: Option<String>,
    pub product_id: Option<String>,
    pub buyer_id: Option<String>,
    pub buyer_phone: Option<String>,
    pub buyer_email: Option<String>,
    pub buyer_name: Option<String>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub amount: Option<Decimal>,
    pub return_origin: Option<String>,
    /// Identifier of an earlier attempt for the same purchase, reused on retry.
    pub order_id: Option<String>,
}

impl CreateOrderRequest {
    /// Parses a raw JSON body. Malformed JSON is a caller error.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| {
            PaymentError::ValidationError(format!("Invalid request body: {}", e))
        })
    }

    /// Validates the request into a [`PurchaseIntent`].
    ///
    /// # Arguments
    ///
    /// * `fallback_origin` - Used when the request carries no `returnOrigin`.
    pub fn into_intent(self, fallback_origin: Option<&str>) -> Result<PurchaseIntent> {
        let kind = self
            .subject_kind
            .as_deref()
            .ok_or_else(|| PaymentError::ValidationError("subjectKind is required".to_string()))
            .and_then(|raw| {
                PurchaseKind::parse(raw).ok_or_else(|| {
                    PaymentError::ValidationError(format!(
                        "subjectKind must be 'subscription' or 'product', got '{}'",
                        raw
                    ))
                })
            })?;

        let (own, other) = match kind {
            PurchaseKind::Subscription => (self.plan_id, self.product_id),
            PurchaseKind::Product => (self.product_id, self.plan_id),
        };
        let subject_id = match (self.subject_id, own) {
            (Some(subject), Some(legacy)) if subject.trim() != legacy.trim() => {
                return Err(PaymentError::ValidationError(format!(
                    "subjectId '{}' does not match {} '{}'",
                    subject,
                    kind.subject_param(),
                    legacy
                )));
            }
            (Some(subject), _) => subject,
            (None, Some(legacy)) => legacy,
            (None, None) if other.is_some() => {
                return Err(PaymentError::ValidationError(format!(
                    "A {} purchase needs {}, not the id of another kind",
                    kind,
                    kind.subject_param()
                )));
            }
            (None, None) => String::new(),
        };

        let amount = self
            .amount
            .ok_or_else(|| PaymentError::ValidationError("amount is required".to_string()))?;

        let return_origin = self
            .return_origin
            .filter(|o| !o.trim().is_empty())
            .or_else(|| fallback_origin.map(str::to_string))
            .unwrap_or_default();

        PurchaseIntent::new(
            kind,
            subject_id,
            self.buyer_id.unwrap_or_default(),
            amount,
            BuyerContact::with_defaults(self.buyer_email, self.buyer_phone, self.buyer_name),
            return_origin,
        )
    }
}
