use crate::domain::order::{GatewayOrder, OrderId, OrderRequest};
use crate::domain::ports::{EntitlementOutcome, EntitlementReconciler, GatewayClient};
use crate::domain::status::{PaymentStatus, VerificationResult};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Failure the in-memory gateway injects into every call until cleared.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayFault {
    Timeout,
    Reject { code: String, message: String },
}

/// A thread-safe in-memory stand-in for the payment gateway.
///
/// Keeps order bodies in the gateway's wire format, counts calls per operation
/// and can inject faults. Clones share state, so a test can keep one handle
/// while the service owns another.
#[derive(Default, Clone)]
pub struct InMemoryGateway {
    orders: Arc<RwLock<HashMap<String, Value>>>,
    fault: Arc<RwLock<Option<GatewayFault>>>,
    create_calls: Arc<AtomicUsize>,
    fetch_calls: Arc<AtomicUsize>,
}

impl InMemoryGateway {
    /// Creates a new, empty in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub async fn set_fault(&self, fault: Option<GatewayFault>) {
        *self.fault.write().await = fault;
    }

    /// Moves a stored order to a new gateway status, as a payment would.
    pub async fn set_status(&self, order_id: &str, status: &str, settled: bool) -> bool {
        let mut orders = self.orders.write().await;
        match orders.get_mut(order_id) {
            Some(body) => {
                body["order_status"] = json!(status);
                body["settled"] = json!(settled);
                true
            }
            None => false,
        }
    }

    /// Stores a raw order body as if it had been created at the gateway.
    pub async fn insert_raw(&self, body: Value) {
        if let Some(id) = body.get("order_id").and_then(Value::as_str) {
            self.orders.write().await.insert(id.to_string(), body);
        }
    }

    async fn check_fault(&self) -> Result<()> {
        match self.fault.read().await.clone() {
            None => Ok(()),
            Some(GatewayFault::Timeout) => Err(PaymentError::GatewayUnavailable(
                "request timed out".to_string(),
            )),
            Some(GatewayFault::Reject { code, message }) => Err(PaymentError::GatewayRejected {
                details: json!({ "code": code, "message": message }),
                code: Some(code),
                message,
            }),
        }
    }
}

#[async_trait]
impl GatewayClient for InMemoryGateway {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fault().await?;

        let mut orders = self.orders.write().await;
        let order_id = request.order_id.as_str();
        if orders.contains_key(order_id) {
            return Err(PaymentError::DuplicateOrder(order_id.to_string()));
        }

        let mut body = serde_json::to_value(request).map_err(|e| {
            PaymentError::GatewayProtocolError(format!("Unserializable order: {}", e))
        })?;
        body["order_status"] = json!("ACTIVE");
        body["payment_session_id"] = json!(format!("session_{}", order_id));
        orders.insert(order_id.to_string(), body.clone());

        GatewayOrder::from_raw(body)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<GatewayOrder> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fault().await?;

        let orders = self.orders.read().await;
        match orders.get(order_id.as_str()) {
            Some(body) => GatewayOrder::from_raw(body.clone()),
            None => Err(PaymentError::GatewayRejected {
                code: Some("order_not_found".to_string()),
                message: "Order not found".to_string(),
                details: json!({"code": "order_not_found", "message": "Order not found"}),
            }),
        }
    }
}

/// A thread-safe in-memory entitlement ledger.
///
/// Grants each paid order exactly once, however often it is verified.
#[derive(Default, Clone)]
pub struct InMemoryEntitlements {
    granted: Arc<RwLock<HashMap<String, VerificationResult>>>,
}

impl InMemoryEntitlements {
    /// Creates a new, empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, order_id: &str) -> Option<VerificationResult> {
        self.granted.read().await.get(order_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.granted.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.granted.read().await.is_empty()
    }
}

#[async_trait]
impl EntitlementReconciler for InMemoryEntitlements {
    async fn reconcile(&self, result: &VerificationResult) -> Result<EntitlementOutcome> {
        match result.status {
            PaymentStatus::Pending => Ok(EntitlementOutcome::Deferred),
            PaymentStatus::Failed => Ok(EntitlementOutcome::Denied),
            PaymentStatus::Paid => {
                let mut granted = self.granted.write().await;
                if granted.contains_key(&result.order_id) {
                    return Ok(EntitlementOutcome::AlreadyGranted);
                }
                granted.insert(result.order_id.clone(), result.clone());
                Ok(EntitlementOutcome::Granted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intent::{BuyerContact, PurchaseIntent, PurchaseKind};
    use crate::domain::status::GatewayStatus;
    use rust_decimal_macros::dec;

    fn request(buyer: &str, millis: u64) -> OrderRequest {
        let intent = PurchaseIntent::new(
            PurchaseKind::Subscription,
            "1_month",
            buyer,
            dec!(999),
            BuyerContact::default(),
            "https://app.example",
        )
        .unwrap();
        OrderRequest::build(&intent, OrderId::generate(buyer, millis), "INR")
    }

    #[tokio::test]
    async fn test_in_memory_gateway_create_and_fetch() {
        let gateway = InMemoryGateway::new();
        let created = gateway.create_order(&request("user-1", 1)).await.unwrap();
        assert_eq!(created.status, GatewayStatus::Active);
        assert_eq!(created.amount, dec!(999));

        assert!(gateway.set_status(&created.order_id, "PAID", false).await);
        let fetched = gateway
            .fetch_order(&OrderId::parse(&created.order_id).unwrap())
            .await
            .unwrap();
        assert_eq!(fetched.status, GatewayStatus::Paid);
        assert_eq!(gateway.create_calls(), 1);
        assert_eq!(gateway.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_gateway_duplicate() {
        let gateway = InMemoryGateway::new();
        gateway.create_order(&request("user-1", 1)).await.unwrap();
        let err = gateway.create_order(&request("user-1", 1)).await.unwrap_err();
        assert!(matches!(err, PaymentError::DuplicateOrder(_)));
    }

    #[tokio::test]
    async fn test_in_memory_gateway_faults() {
        let gateway = InMemoryGateway::new();
        gateway.set_fault(Some(GatewayFault::Timeout)).await;
        assert!(
            gateway
                .create_order(&request("user-1", 1))
                .await
                .unwrap_err()
                .is_retryable()
        );

        gateway
            .set_fault(Some(GatewayFault::Reject {
                code: "amount_too_large".into(),
                message: "Amount exceeds limit".into(),
            }))
            .await;
        assert!(matches!(
            gateway.create_order(&request("user-1", 2)).await,
            Err(PaymentError::GatewayRejected { .. })
        ));
        assert_eq!(gateway.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_entitlements_granted_once() {
        let ledger = InMemoryEntitlements::new();
        let mut result = VerificationResult {
            order_id: "order_user_1".into(),
            status: PaymentStatus::Pending,
            amount: dec!(270),
            currency: "INR".into(),
            kind: PurchaseKind::Subscription,
            subject_id: "1_week".into(),
        };

        assert_eq!(
            ledger.reconcile(&result).await.unwrap(),
            EntitlementOutcome::Deferred
        );
        assert!(ledger.is_empty().await);

        result.status = PaymentStatus::Paid;
        assert_eq!(
            ledger.reconcile(&result).await.unwrap(),
            EntitlementOutcome::Granted
        );
        assert_eq!(
            ledger.reconcile(&result).await.unwrap(),
            EntitlementOutcome::AlreadyGranted
        );
        assert_eq!(ledger.len().await, 1);
        assert_eq!(ledger.get("order_user_1").await, Some(result.clone()));

        result.order_id = "order_user_2".into();
        result.status = PaymentStatus::Failed;
        assert_eq!(
            ledger.reconcile(&result).await.unwrap(),
            EntitlementOutcome::Denied
        );
        assert_eq!(ledger.len().await, 1);
    }
}
