use super::intent::PurchaseKind;
use super::order::GatewayOrder;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Order status in the gateway's own vocabulary.
///
/// Never leaves this crate's boundary: callers only see [`PaymentStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Paid,
    Active,
    Failed,
    Expired,
    Cancelled,
    Terminated,
    Other(String),
}

impl GatewayStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PAID" => Self::Paid,
            "ACTIVE" => Self::Active,
            "FAILED" => Self::Failed,
            "EXPIRED" => Self::Expired,
            "CANCELLED" | "CANCELED" => Self::Cancelled,
            "TERMINATED" => Self::Terminated,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GatewayStatus::Paid => "PAID",
            GatewayStatus::Active => "ACTIVE",
            GatewayStatus::Failed => "FAILED",
            GatewayStatus::Expired => "EXPIRED",
            GatewayStatus::Cancelled => "CANCELLED",
            GatewayStatus::Terminated => "TERMINATED",
            GatewayStatus::Other(raw) => raw,
        }
    }
}

impl<'de> Deserialize<'de> for GatewayStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Normalized payment status handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Paid,
    Pending,
    Failed,
}

impl PaymentStatus {
    /// Maps a gateway status onto the three-value vocabulary.
    ///
    /// Total over every input: unknown gateway statuses count as failed.
    pub fn from_gateway(status: &GatewayStatus, settled: bool) -> Self {
        match status {
            GatewayStatus::Paid => PaymentStatus::Paid,
            GatewayStatus::Active if settled => PaymentStatus::Paid,
            GatewayStatus::Active => PaymentStatus::Pending,
            GatewayStatus::Failed
            | GatewayStatus::Expired
            | GatewayStatus::Cancelled
            | GatewayStatus::Terminated
            | GatewayStatus::Other(_) => PaymentStatus::Failed,
        }
    }

    /// Whether the status can still change at the gateway.
    pub fn is_final(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// Outcome of verifying an order, consumed by the entitlement reconciler.
///
/// Recomputed on every verification; never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub order_id: String,
    pub status: PaymentStatus,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
    pub currency: String,
    pub kind: PurchaseKind,
    pub subject_id: String,
}

impl VerificationResult {
    pub fn from_order(order: &GatewayOrder) -> Result<Self> {
        let (kind, subject_id) = order.subject()?;
        Ok(Self {
            order_id: order.order_id.clone(),
            status: PaymentStatus::from_gateway(&order.status, order.settled),
            amount: order.amount,
            currency: order.currency.clone(),
            kind,
            subject_id,
        })
    }
}
