use async_trait::async_trait;
use thiserror::Error;

use crate::entities::{CheckoutSession, InitializePayment, PaymentEvent, WebhookRequest};
use crate::value_objects::ProviderKind;

/// Failures a provider adapter can surface. `Unavailable` is the only
/// retryable one; callers translate it into "try again" rather than
/// hanging or failing the order.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),
    #[error("unsupported event: {0}")]
    UnsupportedEvent(String),
}

/// One external payment provider. `initialize` is the only operation
/// that leaves the process; signature verification and webhook parsing
/// touch nothing but the wire bytes.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Header fingerprint: does this inbound callback belong to this
    /// provider's scheme?
    fn matches(&self, request: &WebhookRequest) -> bool;

    async fn initialize(
        &self,
        request: &InitializePayment,
    ) -> Result<CheckoutSession, ProviderError>;

    /// Constant-time authentication of the raw callback body.
    fn verify_signature(&self, request: &WebhookRequest) -> bool;

    fn parse_webhook(&self, body: &[u8]) -> Result<PaymentEvent, ProviderError>;
}

/// Out-of-band notification delivery, driven by the outbox relay. An
/// `Err` means "not delivered, retry later"; the relay owns scheduling.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        recipient: &str,
        template: &str,
        payload: &serde_json::Value,
    ) -> anyhow::Result<()>;
}
