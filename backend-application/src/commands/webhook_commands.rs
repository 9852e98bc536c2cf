// Webhook ingestion and payment reconciliation

use chrono::Utc;
use tracing::{debug, info, warn};

use backend_domain::ports::TransitionOutcome;
use backend_domain::{
    OrderStatus, Payment, PaymentEvent, PaymentEventStatus, PaymentStatus, ProviderError,
    WebhookRequest,
};

use crate::commands::ticket_commands;
use crate::{AppError, AppState};

/// How an accepted callback was handled. All three map to HTTP 200;
/// only genuine faults surface as `AppError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Applied,
    Duplicate,
    Ignored,
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Applied => "applied",
            IngestOutcome::Duplicate => "duplicate",
            IngestOutcome::Ignored => "ignored",
        }
    }
}

/// Entry point for inbound provider callbacks: route to the adapter
/// that claims the request, authenticate the raw body, translate it to
/// a canonical event and reconcile. Malformed or unrecognized payloads
/// are swallowed with a 200 so providers do not retry garbage forever;
/// a bad signature is the one thing that must bounce.
pub async fn ingest_webhook(
    state: &AppState,
    request: WebhookRequest,
) -> Result<IngestOutcome, AppError> {
    state.metrics.record_webhook_request();

    let Some(provider) = state
        .providers
        .iter()
        .find(|provider| provider.matches(&request))
    else {
        warn!("webhook rejected: no configured provider claims its headers");
        state.metrics.record_webhook_rejected();
        return Err(AppError::Unauthenticated);
    };

    if !provider.verify_signature(&request) {
        warn!("webhook rejected: bad {} signature", provider.kind());
        state.metrics.record_webhook_rejected();
        return Err(AppError::Unauthenticated);
    }

    let event = match provider.parse_webhook(&request.body) {
        Ok(event) => event,
        Err(ProviderError::UnsupportedEvent(name)) => {
            debug!("ignoring unsupported {} event '{}'", provider.kind(), name);
            state.metrics.record_webhook_ignored();
            return Ok(IngestOutcome::Ignored);
        }
        Err(err) => {
            warn!("discarding malformed {} webhook: {}", provider.kind(), err);
            state.metrics.record_webhook_ignored();
            return Ok(IngestOutcome::Ignored);
        }
    };

    apply_payment_event(state, event).await
}

/// The reconciler. Applies one canonical event to its payment and
/// order with the same end state no matter how many times, or in what
/// order, the provider delivers.
pub async fn apply_payment_event(
    state: &AppState,
    event: PaymentEvent,
) -> Result<IngestOutcome, AppError> {
    let payment = match state
        .payment_repo
        .find_payment_by_reference(event.provider, &event.reference)
        .await?
    {
        Some(payment) => payment,
        None => match rebuild_payment(state, &event).await? {
            Some(payment) => payment,
            None => {
                warn!(
                    "ignoring {} event for unknown reference {}",
                    event.provider, event.reference
                );
                state.metrics.record_webhook_ignored();
                return Ok(IngestOutcome::Ignored);
            }
        },
    };

    match event.status {
        PaymentEventStatus::Pending => apply_pending(state, &payment, &event).await,
        PaymentEventStatus::Successful => apply_success(state, &payment, &event).await,
        PaymentEventStatus::Failed => apply_failure(state, &payment, &event).await,
        PaymentEventStatus::Refunded => apply_refund(state, &payment, &event).await,
    }
}

/// A callback can arrive for a reference we have no row for, e.g. one
/// initialized before a restore from backup. If the provider echoed our
/// order metadata back and the order exists, recreate the payment and
/// reconcile as usual.
async fn rebuild_payment(
    state: &AppState,
    event: &PaymentEvent,
) -> Result<Option<Payment>, AppError> {
    let Some(order_id) = event.order_id else {
        return Ok(None);
    };
    if state.order_repo.find_order(order_id).await?.is_none() {
        return Ok(None);
    }

    let payment = Payment::from_event(event, order_id);
    state.payment_repo.insert_payment(&payment).await?;
    info!(
        "recreated payment {} for order {} from {} webhook",
        payment.id, order_id, event.provider
    );
    Ok(Some(payment))
}

async fn apply_pending(
    state: &AppState,
    payment: &Payment,
    event: &PaymentEvent,
) -> Result<IngestOutcome, AppError> {
    match state
        .payment_repo
        .transition_payment(
            payment.id,
            &[PaymentStatus::Initialized],
            PaymentStatus::Pending,
            &event.raw,
            Utc::now(),
        )
        .await?
    {
        TransitionOutcome::Applied => Ok(IngestOutcome::Applied),
        TransitionOutcome::AlreadyApplied => {
            state.metrics.record_webhook_duplicate();
            Ok(IngestOutcome::Duplicate)
        }
        // Already past pending; the event carries nothing new.
        TransitionOutcome::Rejected => Ok(IngestOutcome::Ignored),
    }
}

async fn apply_success(
    state: &AppState,
    payment: &Payment,
    event: &PaymentEvent,
) -> Result<IngestOutcome, AppError> {
    let outcome = state
        .payment_repo
        .transition_payment(
            payment.id,
            &[PaymentStatus::Initialized, PaymentStatus::Pending],
            PaymentStatus::Successful,
            &event.raw,
            Utc::now(),
        )
        .await?;

    let duplicate = match outcome {
        TransitionOutcome::Applied => {
            info!(
                "payment {} for order {} confirmed by {}",
                payment.id, payment.order_id, payment.provider
            );
            state.metrics.record_payment_succeeded();
            false
        }
        TransitionOutcome::AlreadyApplied => {
            debug!(
                "duplicate success event for reference {}",
                payment.provider_reference
            );
            state.metrics.record_webhook_duplicate();
            true
        }
        TransitionOutcome::Rejected => return reconcile_rejected_success(state, payment).await,
    };

    // Fulfillment and issuance are idempotent, so duplicates run them
    // again. A crash between the payment update and issuance converges
    // on the provider's next retry.
    fulfill_order(state, payment, event).await?;

    Ok(if duplicate {
        IngestOutcome::Duplicate
    } else {
        IngestOutcome::Applied
    })
}

/// A success event bounced off a terminal payment. Which terminal state
/// it sits in decides whether that is routine or suspicious.
async fn reconcile_rejected_success(
    state: &AppState,
    payment: &Payment,
) -> Result<IngestOutcome, AppError> {
    let current = state
        .payment_repo
        .find_payment(payment.id)
        .await?
        .map(|payment| payment.status);

    match current {
        // Refunded implies the success was applied some time ago.
        Some(PaymentStatus::Refunded) => {
            state.metrics.record_webhook_duplicate();
            Ok(IngestOutcome::Duplicate)
        }
        Some(PaymentStatus::Failed) => {
            warn!(
                "success event for payment {} already marked failed; flagged for review",
                payment.id
            );
            state
                .payment_repo
                .flag_payment_for_review(payment.id)
                .await?;
            state.metrics.record_payment_flagged();
            Ok(IngestOutcome::Ignored)
        }
        _ => Ok(IngestOutcome::Ignored),
    }
}

/// Order-side half of a confirmed payment: verify the charge matches
/// what was quoted, mark the order fulfilled and issue its tickets.
async fn fulfill_order(
    state: &AppState,
    payment: &Payment,
    event: &PaymentEvent,
) -> Result<(), AppError> {
    let Some(order) = state.order_repo.find_order(payment.order_id).await? else {
        warn!(
            "payment {} references missing order {}",
            payment.id, payment.order_id
        );
        return Ok(());
    };

    if !order.matches_charge(event.amount, &event.currency) {
        warn!(
            "amount mismatch on order {}: expected {} {}, charged {} {}; flagged for review",
            order.id, order.total_amount, order.currency, event.amount, event.currency
        );
        state
            .payment_repo
            .flag_payment_for_review(payment.id)
            .await?;
        state.metrics.record_payment_flagged();
        return Ok(());
    }

    match state
        .order_repo
        .transition_order(
            order.id,
            &[OrderStatus::Pending],
            OrderStatus::Fulfilled,
            Utc::now(),
        )
        .await?
    {
        TransitionOutcome::Applied => {
            info!("order {} fulfilled", order.id);
        }
        TransitionOutcome::AlreadyApplied => {}
        TransitionOutcome::Rejected => {
            warn!(
                "payment {} succeeded for cancelled order {}; flagged for review",
                payment.id, order.id
            );
            state
                .payment_repo
                .flag_payment_for_review(payment.id)
                .await?;
            state.metrics.record_payment_flagged();
            return Ok(());
        }
    }

    ticket_commands::issue_for_order(state, &order).await?;
    Ok(())
}

async fn apply_failure(
    state: &AppState,
    payment: &Payment,
    event: &PaymentEvent,
) -> Result<IngestOutcome, AppError> {
    match state
        .payment_repo
        .transition_payment(
            payment.id,
            &[PaymentStatus::Initialized, PaymentStatus::Pending],
            PaymentStatus::Failed,
            &event.raw,
            Utc::now(),
        )
        .await?
    {
        TransitionOutcome::Applied => {
            info!(
                "payment {} failed; order {} stays open for another attempt",
                payment.id, payment.order_id
            );
            state.metrics.record_payment_failed();
            Ok(IngestOutcome::Applied)
        }
        TransitionOutcome::AlreadyApplied => {
            state.metrics.record_webhook_duplicate();
            Ok(IngestOutcome::Duplicate)
        }
        // Tie-break: a late failure never overwrites a success.
        TransitionOutcome::Rejected => {
            debug!(
                "ignoring failed event for payment {} in a terminal state",
                payment.id
            );
            Ok(IngestOutcome::Ignored)
        }
    }
}

async fn apply_refund(
    state: &AppState,
    payment: &Payment,
    event: &PaymentEvent,
) -> Result<IngestOutcome, AppError> {
    let outcome = state
        .payment_repo
        .transition_payment(
            payment.id,
            &[PaymentStatus::Successful],
            PaymentStatus::Refunded,
            &event.raw,
            Utc::now(),
        )
        .await?;

    match outcome {
        TransitionOutcome::Applied | TransitionOutcome::AlreadyApplied => {
            if outcome == TransitionOutcome::Applied {
                state.metrics.record_payment_refunded();
            } else {
                state.metrics.record_webhook_duplicate();
            }
            // The cascade only touches tickets still active, so rerunning
            // it on a duplicate delivery converges instead of widening.
            let refunded = state
                .ticket_repo
                .refund_active_tickets(payment.order_id)
                .await?;
            info!(
                "payment {} refunded; {} tickets voided for order {}",
                payment.id, refunded, payment.order_id
            );
            if outcome == TransitionOutcome::Applied {
                Ok(IngestOutcome::Applied)
            } else {
                Ok(IngestOutcome::Duplicate)
            }
        }
        TransitionOutcome::Rejected => {
            let current = state
                .payment_repo
                .find_payment(payment.id)
                .await?
                .map(|payment| payment.status);
            match current {
                Some(PaymentStatus::Failed) => {
                    warn!("refund event for failed payment {} ignored", payment.id);
                    Ok(IngestOutcome::Ignored)
                }
                // The matching success may still be in flight. Bounce
                // with a 5xx so the provider redelivers after it lands.
                _ => Err(AppError::Internal(anyhow::anyhow!(
                    "refund for payment {} arrived before its success",
                    payment.id
                ))),
            }
        }
    }
}
