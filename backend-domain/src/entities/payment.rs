// Payment entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Order, PaymentEvent};
use crate::value_objects::{OrderId, PaymentId, PaymentStatus, ProviderKind, ProviderReference};

/// One attempt to settle an Order via an external provider.
///
/// `(provider, provider_reference)` is unique; exactly one success
/// transition may ever be applied for it. `raw_event` keeps the last
/// provider payload that moved the status, for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub provider: ProviderKind,
    pub provider_reference: ProviderReference,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub flagged_for_review: bool,
    pub raw_event: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Payment created when checkout is initialized with a provider.
    pub fn initialize(order: &Order, provider: ProviderKind, reference: ProviderReference) -> Self {
        Self {
            id: PaymentId::generate(),
            order_id: order.id,
            provider,
            provider_reference: reference,
            amount: order.total_amount,
            currency: order.currency.clone(),
            status: PaymentStatus::Initialized,
            flagged_for_review: false,
            raw_event: serde_json::Value::Null,
            created_at: Utc::now(),
            verified_at: None,
            refunded_at: None,
        }
    }

    /// Payment reconstructed from a webhook that arrived for a reference
    /// we have no record of. Starts in `Pending`; the event that created
    /// it is applied on top through the normal transition path.
    pub fn from_event(event: &PaymentEvent, order_id: OrderId) -> Self {
        Self {
            id: PaymentId::generate(),
            order_id,
            provider: event.provider,
            provider_reference: event.reference.clone(),
            amount: event.amount,
            currency: event.currency.clone(),
            status: PaymentStatus::Pending,
            flagged_for_review: false,
            raw_event: serde_json::Value::Null,
            created_at: Utc::now(),
            verified_at: None,
            refunded_at: None,
        }
    }
}
