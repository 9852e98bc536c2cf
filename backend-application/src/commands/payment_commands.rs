// Checkout initialization and order cancellation

use chrono::Utc;
use tracing::info;

use backend_domain::ports::TransitionOutcome;
use backend_domain::{
    CheckoutReceipt, CheckoutRequest, InitializePayment, Order, OrderId, OrderStatus, Payment,
    ProviderError, ProviderKind,
};

use crate::{AppError, AppState};

/// Hard cap per order; large blocks go through the organizer flow.
const MAX_TICKETS_PER_ORDER: u32 = 20;

/// Creates (or re-uses) a pending order and opens a checkout session
/// with the requested provider. The payment row is inserted in
/// `Initialized` before we hand the redirect URL back, so the webhook
/// that follows always finds its reference.
pub async fn initialize_payment(
    state: &AppState,
    request: CheckoutRequest,
) -> Result<CheckoutReceipt, AppError> {
    let Some(kind) = ProviderKind::parse(&request.provider) else {
        return Err(AppError::BadRequest(format!(
            "unknown provider '{}'",
            request.provider
        )));
    };
    let Some(provider) = state
        .providers
        .iter()
        .find(|provider| provider.kind() == kind)
    else {
        return Err(AppError::BadRequest(format!(
            "provider '{}' is not configured",
            kind
        )));
    };

    let order = match request.order_id {
        Some(order_id) => {
            let Some(order) = state.order_repo.find_order(order_id).await? else {
                return Err(AppError::NotFound(format!("order {}", order_id)));
            };
            if order.status != OrderStatus::Pending {
                return Err(AppError::InvalidState(format!(
                    "order is {} and cannot be paid",
                    order.status.as_str()
                )));
            }
            order
        }
        None => {
            validate_new_order(&request)?;
            let order = Order::new(&request);
            state.order_repo.insert_order(&order).await?;
            info!(
                "order {} created: {} x {} for {}",
                order.id, order.quantity, order.ticket_type, order.buyer_email
            );
            order
        }
    };

    let init = InitializePayment {
        order_id: order.id,
        amount: order.total_amount,
        currency: order.currency.clone(),
        customer_name: order.buyer_name.clone(),
        customer_email: order.buyer_email.clone(),
        metadata: request.metadata.clone(),
    };

    let session = provider.initialize(&init).await.map_err(|err| match err {
        ProviderError::Unavailable(msg) => AppError::ProviderUnavailable(msg),
        ProviderError::InvalidRequest(msg) => AppError::BadRequest(msg),
        other => AppError::Internal(anyhow::anyhow!(other)),
    })?;

    let payment = Payment::initialize(&order, kind, session.reference.clone());
    state.payment_repo.insert_payment(&payment).await?;
    state.metrics.record_payment_initialized();
    info!(
        "payment {} initialized with {} for order {}",
        payment.id, kind, order.id
    );

    Ok(CheckoutReceipt {
        order_id: order.id,
        payment_id: payment.id,
        provider: kind,
        reference: payment.provider_reference,
        redirect_url: session.redirect_url,
    })
}

/// Cancels a pending order. Fulfilled orders are immutable; voiding
/// their tickets goes through the refund path instead.
pub async fn cancel_order(state: &AppState, order_id: OrderId) -> Result<Order, AppError> {
    let Some(order) = state.order_repo.find_order(order_id).await? else {
        return Err(AppError::NotFound(format!("order {}", order_id)));
    };

    match state
        .order_repo
        .transition_order(
            order_id,
            &[OrderStatus::Pending],
            OrderStatus::Cancelled,
            Utc::now(),
        )
        .await?
    {
        TransitionOutcome::Applied => {
            info!("order {} cancelled", order_id);
        }
        TransitionOutcome::AlreadyApplied => {}
        TransitionOutcome::Rejected => {
            return Err(AppError::InvalidState(format!(
                "order is {} and cannot be cancelled",
                order.status.as_str()
            )));
        }
    }

    Ok(state.order_repo.find_order(order_id).await?.unwrap_or(order))
}

fn validate_new_order(request: &CheckoutRequest) -> Result<(), AppError> {
    if request.buyer_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "buyer_name must not be empty".to_string(),
        ));
    }
    let email = request.buyer_email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest(
            "buyer_email must be a valid address".to_string(),
        ));
    }
    if request.currency.trim().len() != 3 {
        return Err(AppError::BadRequest(
            "currency must be a 3-letter code".to_string(),
        ));
    }
    if request.amount <= 0 {
        return Err(AppError::BadRequest("amount must be positive".to_string()));
    }
    if request.quantity == 0 || request.quantity > MAX_TICKETS_PER_ORDER {
        return Err(AppError::BadRequest(format!(
            "quantity must be between 1 and {}",
            MAX_TICKETS_PER_ORDER
        )));
    }
    if request.ticket_type.trim().is_empty() {
        return Err(AppError::BadRequest(
            "ticket_type must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use backend_domain::ports::PaymentProvider;
    use backend_domain::services::QrCodec;
    use backend_domain::{
        CheckoutSession, PaymentEvent, PaymentStatus, ProviderReference, WebhookRequest,
    };
    use backend_infrastructure::config::AppConfig;
    use backend_infrastructure::repositories::InMemoryStore;
    use backend_infrastructure::services::NoopNotifier;

    use super::*;
    use crate::Metrics;

    struct StubProvider {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl PaymentProvider for StubProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Paystack
        }

        fn matches(&self, _request: &WebhookRequest) -> bool {
            false
        }

        async fn initialize(
            &self,
            request: &InitializePayment,
        ) -> Result<CheckoutSession, ProviderError> {
            if self.fail {
                return Err(ProviderError::Unavailable("stub is down".to_string()));
            }
            Ok(CheckoutSession {
                reference: ProviderReference::generate(),
                redirect_url: format!("https://pay.example/session/{}", request.order_id),
            })
        }

        fn verify_signature(&self, _request: &WebhookRequest) -> bool {
            false
        }

        fn parse_webhook(&self, _body: &[u8]) -> Result<PaymentEvent, ProviderError> {
            Err(ProviderError::MalformedPayload("stub".to_string()))
        }
    }

    fn test_state(providers: Vec<Arc<dyn PaymentProvider>>) -> AppState {
        let store = Arc::new(InMemoryStore::new());
        AppState {
            config: AppConfig::default().to_runtime_config(),
            order_repo: store.clone(),
            payment_repo: store.clone(),
            ticket_repo: store.clone(),
            validation_repo: store.clone(),
            outbox_repo: store,
            providers: Arc::new(providers),
            notifier: Arc::new(NoopNotifier),
            qr_codec: Arc::new(QrCodec::new("test-qr-secret", 12).expect("codec")),
            metrics: Arc::new(Metrics::default()),
        }
    }

    fn working_provider() -> Vec<Arc<dyn PaymentProvider>> {
        vec![Arc::new(StubProvider { fail: false })]
    }

    fn checkout_request(quantity: u32) -> CheckoutRequest {
        CheckoutRequest {
            provider: "paystack".to_string(),
            order_id: None,
            buyer_name: "Ada Obi".to_string(),
            buyer_email: " Ada@Example.com ".to_string(),
            buyer_phone: None,
            currency: "ngn".to_string(),
            amount: 500_000,
            quantity,
            ticket_type: "general".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn checkout_creates_order_and_initialized_payment() {
        let state = test_state(working_provider());

        let receipt = initialize_payment(&state, checkout_request(2))
            .await
            .expect("checkout");

        let order = state
            .order_repo
            .find_order(receipt.order_id)
            .await
            .expect("find order")
            .expect("order exists");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.buyer_email, "ada@example.com");
        assert_eq!(order.currency, "NGN");

        let payment = state
            .payment_repo
            .find_payment(receipt.payment_id)
            .await
            .expect("find payment")
            .expect("payment exists");
        assert_eq!(payment.status, PaymentStatus::Initialized);
        assert_eq!(payment.provider_reference, receipt.reference);
        assert!(receipt.redirect_url.starts_with("https://pay.example/"));
    }

    #[tokio::test]
    async fn retry_reuses_the_pending_order() {
        let state = test_state(working_provider());
        let first = initialize_payment(&state, checkout_request(1))
            .await
            .expect("first attempt");

        let mut retry = checkout_request(1);
        retry.order_id = Some(first.order_id);
        let second = initialize_payment(&state, retry).await.expect("retry");

        assert_eq!(second.order_id, first.order_id);
        assert_ne!(second.payment_id, first.payment_id);
        let payments = state
            .payment_repo
            .list_payments_for_order(first.order_id)
            .await
            .expect("list payments");
        assert_eq!(payments.len(), 2);
    }

    #[tokio::test]
    async fn provider_outage_maps_to_unavailable_and_keeps_the_order() {
        let state = test_state(vec![Arc::new(StubProvider { fail: true })]);

        let err = initialize_payment(&state, checkout_request(1))
            .await
            .expect_err("should fail");
        assert!(matches!(err, AppError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_up_front() {
        let state = test_state(working_provider());

        let mut no_email = checkout_request(1);
        no_email.buyer_email = "not-an-address".to_string();
        assert!(matches!(
            initialize_payment(&state, no_email).await,
            Err(AppError::BadRequest(_))
        ));

        let mut zero_amount = checkout_request(1);
        zero_amount.amount = 0;
        assert!(matches!(
            initialize_payment(&state, zero_amount).await,
            Err(AppError::BadRequest(_))
        ));

        let mut too_many = checkout_request(21);
        too_many.amount = 21 * 250_000;
        assert!(matches!(
            initialize_payment(&state, too_many).await,
            Err(AppError::BadRequest(_))
        ));

        let mut unknown_provider = checkout_request(1);
        unknown_provider.provider = "stripe".to_string();
        assert!(matches!(
            initialize_payment(&state, unknown_provider).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn unconfigured_provider_is_a_bad_request() {
        let state = test_state(Vec::new());

        let err = initialize_payment(&state, checkout_request(1))
            .await
            .expect_err("no providers configured");
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn cancel_is_idempotent_for_pending_orders() {
        let state = test_state(working_provider());
        let receipt = initialize_payment(&state, checkout_request(1))
            .await
            .expect("checkout");

        let cancelled = cancel_order(&state, receipt.order_id).await.expect("cancel");
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let again = cancel_order(&state, receipt.order_id)
            .await
            .expect("cancel twice");
        assert_eq!(again.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_orders_refuse_new_payment_attempts() {
        let state = test_state(working_provider());
        let receipt = initialize_payment(&state, checkout_request(1))
            .await
            .expect("checkout");
        cancel_order(&state, receipt.order_id).await.expect("cancel");

        let mut retry = checkout_request(1);
        retry.order_id = Some(receipt.order_id);
        let err = initialize_payment(&state, retry)
            .await
            .expect_err("cancelled order");
        assert!(matches!(err, AppError::InvalidState(_)));
    }
}
