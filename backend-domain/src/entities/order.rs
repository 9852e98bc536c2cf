// Order entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{CheckoutRequest, Payment, Ticket};
use crate::value_objects::{OrderId, OrderStatus};

/// A purchase intent for one or more tickets of a single type.
///
/// Mutated only by the reconciler once created; immutable after it
/// reaches `Fulfilled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_name: String,
    pub buyer_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_phone: Option<String>,
    pub currency: String,
    pub total_amount: i64,
    pub quantity: u32,
    pub ticket_type: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(request: &CheckoutRequest) -> Self {
        Self {
            id: OrderId::generate(),
            buyer_name: request.buyer_name.trim().to_string(),
            buyer_email: request.buyer_email.trim().to_lowercase(),
            buyer_phone: request
                .buyer_phone
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            currency: request.currency.trim().to_uppercase(),
            total_amount: request.amount,
            quantity: request.quantity,
            ticket_type: request.ticket_type.trim().to_string(),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            fulfilled_at: None,
        }
    }

    /// Amount/currency check between the provider's event and what the
    /// order expects. Currency comparison ignores case since providers
    /// echo it back in varying capitalizations.
    pub fn matches_charge(&self, amount: i64, currency: &str) -> bool {
        self.total_amount == amount && self.currency.eq_ignore_ascii_case(currency.trim())
    }
}

/// Query-side aggregate: an order with every payment attempt and ticket
/// hanging off it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub payments: Vec<Payment>,
    pub tickets: Vec<Ticket>,
}
