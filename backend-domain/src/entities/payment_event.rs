// Canonical payment event

use serde::Serialize;

use crate::value_objects::{OrderId, PaymentEventStatus, ProviderKind, ProviderReference};

/// Provider-agnostic form of a webhook callback. Adapters translate
/// their wire payloads into this; everything downstream of the ingestor
/// only ever sees a `PaymentEvent`.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentEvent {
    pub provider: ProviderKind,
    pub reference: ProviderReference,
    pub status: PaymentEventStatus,
    pub amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    /// Order the provider echoed back from initialization metadata, when
    /// present. Lets the reconciler rebuild a payment row it never saw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    pub raw: serde_json::Value,
}

/// Inbound webhook callback as the transport layer hands it over:
/// lowercased header pairs plus the untouched raw body the signature
/// was computed over.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl WebhookRequest {
    pub fn new(headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
