use super::order::{GatewayOrder, OrderId, OrderRequest};
use super::status::VerificationResult;
use crate::error::Result;
use async_trait::async_trait;

/// Outbound port to the payment gateway.
///
/// Each call is a single outbound request with a bounded timeout. Transport
/// failures surface as `GatewayUnavailable`, structured refusals as
/// `GatewayRejected` and unreadable bodies as `GatewayProtocolError`.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder>;
    async fn fetch_order(&self, order_id: &OrderId) -> Result<GatewayOrder>;
}

/// What the reconciler did with a verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementOutcome {
    Granted,
    AlreadyGranted,
    Deferred,
    Denied,
}

/// Consumer of verification results that grants access once an order is paid.
///
/// Implementations must be idempotent per order: verification may be polled
/// any number of times.
#[async_trait]
pub trait EntitlementReconciler: Send + Sync {
    async fn reconcile(&self, result: &VerificationResult) -> Result<EntitlementOutcome>;
}

/// Source of the timestamp embedded in new order ids.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

pub type GatewayClientBox = Box<dyn GatewayClient>;
pub type ClockBox = Box<dyn Clock>;
