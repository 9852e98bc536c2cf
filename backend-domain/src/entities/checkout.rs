// Checkout request/response shapes

use serde::{Deserialize, Serialize};

use crate::value_objects::{OrderId, PaymentId, ProviderKind, ProviderReference};

/// Body of the initialize-payment endpoint. Either carries the buyer and
/// order fields for a fresh order, or `order_id` to retry payment for an
/// existing pending one.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub provider: String,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub buyer_name: String,
    #[serde(default)]
    pub buyer_email: String,
    #[serde(default)]
    pub buyer_phone: Option<String>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub ticket_type: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_quantity() -> u32 {
    1
}

/// What a provider adapter needs to open a checkout session.
#[derive(Debug, Clone)]
pub struct InitializePayment {
    pub order_id: OrderId,
    pub amount: i64,
    pub currency: String,
    pub customer_name: String,
    pub customer_email: String,
    pub metadata: serde_json::Value,
}

/// Provider-side session: their reference for the attempt plus the URL
/// the buyer is redirected to.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub reference: ProviderReference,
    pub redirect_url: String,
}

/// Response of the initialize-payment endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub provider: ProviderKind,
    pub reference: ProviderReference,
    pub redirect_url: String,
}
