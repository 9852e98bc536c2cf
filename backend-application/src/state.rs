use std::sync::Arc;

use backend_domain::ports::{
    Notifier, OrderRepository, OutboxRepository, PaymentProvider, PaymentRepository,
    TicketRepository, ValidationRepository,
};
use backend_domain::services::QrCodec;
use backend_domain::RuntimeConfig;

use crate::Metrics;

/// Shared handles for every request. All mutable state lives behind the
/// repositories, so cloning this is cheap and the handlers stay stateless.
#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub order_repo: Arc<dyn OrderRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub ticket_repo: Arc<dyn TicketRepository>,
    pub validation_repo: Arc<dyn ValidationRepository>,
    pub outbox_repo: Arc<dyn OutboxRepository>,
    pub providers: Arc<Vec<Arc<dyn PaymentProvider>>>,
    pub notifier: Arc<dyn Notifier>,
    pub qr_codec: Arc<QrCodec>,
    pub metrics: Arc<Metrics>,
}
