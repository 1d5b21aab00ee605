use crate::config::GatewayConfig;
use crate::domain::intent::{CreateOrderRequest, PurchaseIntent};
use crate::domain::order::{GatewayOrder, OrderId, OrderRequest};
use crate::domain::ports::{ClockBox, GatewayClientBox};
use crate::domain::status::VerificationResult;
use crate::error::{PaymentError, Result};
use crate::infrastructure::clock::SystemClock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Backoff schedule for [`OrderService::await_settlement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Creates and verifies payment orders against the gateway.
///
/// `OrderService` holds no mutable state: the gateway owns every order, and
/// each call is an independent translation between caller requests and
/// gateway calls. Both request adapters share one instance.
pub struct OrderService {
    gateway: GatewayClientBox,
    clock: ClockBox,
    currency: String,
    fallback_origin: Option<String>,
}

impl OrderService {
    /// Creates a new `OrderService`.
    ///
    /// # Arguments
    ///
    /// * `gateway` - The client used for every outbound gateway call.
    /// * `config` - Supplies the currency and the fallback return origin.
    pub fn new(gateway: GatewayClientBox, config: &GatewayConfig) -> Self {
        Self {
            gateway,
            clock: Box::new(SystemClock),
            currency: config.currency.clone(),
            fallback_origin: config.public_base_url.clone(),
        }
    }

    /// Replaces the clock used to stamp new order ids.
    pub fn with_clock(mut self, clock: ClockBox) -> Self {
        self.clock = clock;
        self
    }

    /// Handles a create-order call from the client application.
    ///
    /// Validation happens before any gateway call. A request carrying the
    /// `orderId` of an earlier attempt reuses it, so a retried purchase can
    /// never mint a second order; the gateway answers such a retry with a
    /// duplicate-order error if the first attempt went through.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder> {
        let retry_of = request
            .order_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(OrderId::parse_own)
            .transpose()?;
        let intent = request.into_intent(self.fallback_origin.as_deref())?;
        self.create_from_intent(&intent, retry_of).await
    }

    /// Submits a validated intent to the gateway.
    pub async fn create_from_intent(
        &self,
        intent: &PurchaseIntent,
        order_id: Option<OrderId>,
    ) -> Result<GatewayOrder> {
        let order_id = order_id
            .unwrap_or_else(|| OrderId::generate(&intent.buyer_id, self.clock.now_millis()));
        let request = OrderRequest::build(intent, order_id, &self.currency);

        debug!(
            order_id = %request.order_id,
            kind = %intent.kind,
            subject_id = %intent.subject_id,
            "Submitting order"
        );

        match self.gateway.create_order(&request).await {
            Ok(order) => {
                info!(order_id = %order.order_id, kind = %intent.kind, "Order accepted");
                Ok(order)
            }
            Err(e) => {
                warn!(
                    order_id = %request.order_id,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Order creation failed"
                );
                Err(e)
            }
        }
    }

    /// Fetches an order and normalizes its status.
    ///
    /// Read-only and safe to call any number of times for the same order.
    pub async fn verify_order(&self, order_id: &str) -> Result<VerificationResult> {
        let order_id = OrderId::parse(order_id)?;
        let order = self.gateway.fetch_order(&order_id).await.inspect_err(|e| {
            warn!(order_id = %order_id, retryable = e.is_retryable(), error = %e, "Order verification failed");
        })?;

        if order.order_id != order_id.as_str() {
            return Err(PaymentError::GatewayProtocolError(format!(
                "Asked for order {} but the gateway returned {}",
                order_id, order.order_id
            )));
        }

        let result = VerificationResult::from_order(&order)?;
        debug!(
            order_id = %order_id,
            gateway_status = order.status.as_str(),
            status = ?result.status,
            "Order verified"
        );
        Ok(result)
    }

    /// Polls verification until the order reaches a final status.
    ///
    /// Retries only while the order is pending or the gateway is unavailable,
    /// doubling the delay between attempts up to `policy.max_delay`. Returns the
    /// last observation once the attempts run out.
    pub async fn await_settlement(
        &self,
        order_id: &str,
        policy: &PollPolicy,
    ) -> Result<VerificationResult> {
        let attempts = policy.attempts.max(1);
        let mut delay = policy.initial_delay.min(policy.max_delay);
        let mut last = None;

        for attempt in 1..=attempts {
            match self.verify_order(order_id).await {
                Ok(result) if result.status.is_final() => return Ok(result),
                Ok(result) => last = Some(Ok(result)),
                Err(e) if e.is_retryable() => last = Some(Err(e)),
                Err(e) => return Err(e),
            }

            if attempt < attempts {
                debug!(order_id, attempt, delay_ms = delay.as_millis() as u64, "Order not settled yet");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2).min(policy.max_delay);
            }
        }

        last.unwrap_or_else(|| {
            Err(PaymentError::GatewayUnavailable(
                "no verification attempt was made".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::intent::PurchaseKind;
    use crate::domain::status::PaymentStatus;
    use crate::error::ErrorKind;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::in_memory::{GatewayFault, InMemoryGateway};
    use rust_decimal_macros::dec;

    fn config() -> GatewayConfig {
        GatewayConfig::from_lookup(|key| match key {
            "GATEWAY_CLIENT_ID" => Some("app-id".to_string()),
            "GATEWAY_CLIENT_SECRET" => Some("secret".to_string()),
            "GATEWAY_API_VERSION" => Some("2023-08-01".to_string()),
            "PUBLIC_BASE_URL" => Some("https://public.example".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn service(gateway: &InMemoryGateway) -> OrderService {
        OrderService::new(Box::new(gateway.clone()), &config())
            .with_clock(Box::new(FixedClock(1_700_000_000_000)))
    }

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            subject_kind: Some("subscription".into()),
            subject_id: Some("1_week".into()),
            buyer_id: Some("user-123".into()),
            amount: Some(dec!(270)),
            return_origin: Some("https://app.example".into()),
            ..Default::default()
        }
    }

    fn fast_policy(attempts: u32) -> PollPolicy {
        PollPolicy {
            attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_create_order_uses_generated_id() {
        let gateway = InMemoryGateway::new();
        let order = service(&gateway).create_order(request()).await.unwrap();

        assert_eq!(order.order_id, "order_user_1700000000000");
        assert_eq!(order.currency, "INR");
        assert_eq!(
            order.raw["order_meta"]["return_url"],
            "https://app.example/subscription/success?order_id={order_id}&plan_id=1_week"
        );
        assert_eq!(gateway.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_create_order_falls_back_to_public_origin() {
        let gateway = InMemoryGateway::new();
        let mut req = request();
        req.return_origin = None;
        let order = service(&gateway).create_order(req).await.unwrap();
        assert_eq!(
            order.raw["order_meta"]["return_url"],
            "https://public.example/subscription/success?order_id={order_id}&plan_id=1_week"
        );
    }

    #[tokio::test]
    async fn test_invalid_intent_never_reaches_gateway() {
        let gateway = InMemoryGateway::new();
        let service = service(&gateway);

        let mut zero = request();
        zero.amount = Some(dec!(0));
        let mut no_buyer = request();
        no_buyer.buyer_id = Some(String::new());
        let mut no_subject = request();
        no_subject.subject_id = Some(String::new());
        let mut foreign_retry = request();
        foreign_retry.order_id = Some("cf_123".into());

        for req in [zero, no_buyer, no_subject, foreign_retry] {
            let err = service.create_order(req).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert_eq!(gateway.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_reuses_order_id() {
        let gateway = InMemoryGateway::new();
        let service = service(&gateway);
        let first = service.create_order(request()).await.unwrap();

        let mut retry = request();
        retry.order_id = Some(first.order_id.clone());
        let err = service.create_order(retry).await.unwrap_err();

        assert!(matches!(err, PaymentError::DuplicateOrder(ref id) if *id == first.order_id));
        assert_eq!(gateway.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_timeout_is_retryable_and_rejection_is_not() {
        let gateway = InMemoryGateway::new();
        let service = service(&gateway);

        gateway.set_fault(Some(GatewayFault::Timeout)).await;
        let timeout = service.create_order(request()).await.unwrap_err();
        assert_eq!(timeout.kind(), ErrorKind::Unavailable);
        assert!(timeout.is_retryable());

        gateway
            .set_fault(Some(GatewayFault::Reject {
                code: "authentication_failed".into(),
                message: "authentication Failed".into(),
            }))
            .await;
        let rejected = service.create_order(request()).await.unwrap_err();
        assert_eq!(rejected.kind(), ErrorKind::Rejected);
        assert!(!rejected.is_retryable());
    }

    #[tokio::test]
    async fn test_verify_paid_order() {
        let gateway = InMemoryGateway::new();
        let service = service(&gateway);
        let order = service.create_order(request()).await.unwrap();
        gateway.set_status(&order.order_id, "PAID", false).await;

        let result = service.verify_order(&order.order_id).await.unwrap();
        assert_eq!(result.status, PaymentStatus::Paid);
        assert_eq!(result.amount, dec!(270));
        assert_eq!(result.currency, "INR");
        assert_eq!(result.kind, PurchaseKind::Subscription);
        assert_eq!(result.subject_id, "1_week");
    }

    #[tokio::test]
    async fn test_verify_rejects_empty_id_without_calling_gateway() {
        let gateway = InMemoryGateway::new();
        let err = service(&gateway).verify_order("  ").await.unwrap_err();
        assert_eq!(err.to_string(), "Missing order_id");
        assert_eq!(gateway.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_verify_unknown_order_is_rejected() {
        let gateway = InMemoryGateway::new();
        let err = service(&gateway)
            .verify_order("order_nobody_1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert!(err.details().is_some());
    }

    #[tokio::test]
    async fn test_await_settlement_stops_on_final_status() {
        let gateway = InMemoryGateway::new();
        let service = service(&gateway);
        let order = service.create_order(request()).await.unwrap();
        gateway.set_status(&order.order_id, "EXPIRED", false).await;

        let result = service
            .await_settlement(&order.order_id, &fast_policy(5))
            .await
            .unwrap();
        assert_eq!(result.status, PaymentStatus::Failed);
        assert_eq!(gateway.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_await_settlement_returns_pending_after_attempts() {
        let gateway = InMemoryGateway::new();
        let service = service(&gateway);
        let order = service.create_order(request()).await.unwrap();

        let result = service
            .await_settlement(&order.order_id, &fast_policy(3))
            .await
            .unwrap();
        assert_eq!(result.status, PaymentStatus::Pending);
        assert_eq!(gateway.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn test_await_settlement_gives_up_on_outage() {
        let gateway = InMemoryGateway::new();
        let service = service(&gateway);
        let order = service.create_order(request()).await.unwrap();
        gateway.set_fault(Some(GatewayFault::Timeout)).await;

        let err = service
            .await_settlement(&order.order_id, &fast_policy(2))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(gateway.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_await_settlement_does_not_retry_rejections() {
        let gateway = InMemoryGateway::new();
        let err = service(&gateway)
            .await_settlement("order_ghost_1", &fast_policy(4))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
        assert_eq!(gateway.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_await_settlement_caps_oversized_delays() {
        let gateway = InMemoryGateway::new();
        let service = service(&gateway);
        let order = service.create_order(request()).await.unwrap();
        let policy = PollPolicy {
            attempts: 3,
            initial_delay: Duration::MAX,
            max_delay: Duration::from_millis(1),
        };

        let result = service
            .await_settlement(&order.order_id, &policy)
            .await
            .unwrap();
        assert_eq!(result.status, PaymentStatus::Pending);
        assert_eq!(gateway.fetch_calls(), 3);
    }
}
