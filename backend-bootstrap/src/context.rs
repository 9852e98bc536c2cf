use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use backend_application::{AppState, Metrics};
use backend_domain::ports::{
    Notifier, OrderRepository, OutboxRepository, PaymentProvider, PaymentRepository,
    TicketRepository, ValidationRepository,
};
use backend_domain::services::QrCodec;
use backend_domain::RuntimeConfig;
use backend_infrastructure::{
    AppConfig, FlutterwaveProvider, InMemoryStore, NoopNotifier, PaystackProvider, PostgresStore,
    WebhookNotifier,
};

pub struct AppContext {
    pub state: AppState,
}

impl AppContext {
    pub async fn new() -> Result<Self> {
        let config = AppConfig::load().await?;
        let runtime_config = config.to_runtime_config();
        let db_config = config.to_db_config();

        let state = match &db_config.database_url {
            Some(url) => {
                let store = PostgresStore::connect(url, db_config.max_connections).await?;
                store.ensure_schema().await?;
                info!("postgres persistence ready");
                build_state(runtime_config, Arc::new(store))?
            }
            None => {
                warn!("database_url not set; orders and tickets will not survive a restart");
                build_state(runtime_config, Arc::new(InMemoryStore::new()))?
            }
        };

        Ok(Self { state })
    }
}

/// One store serves all five repository ports; the handles just borrow
/// different facets of it.
fn build_state<S>(config: RuntimeConfig, store: Arc<S>) -> Result<AppState>
where
    S: OrderRepository
        + PaymentRepository
        + TicketRepository
        + ValidationRepository
        + OutboxRepository
        + 'static,
{
    let providers = configure_providers(&config)?;
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url, config.provider_timeout_seconds)?),
        None => {
            info!("notify_webhook_url not set; outbox messages are logged and dropped");
            Arc::new(NoopNotifier)
        }
    };
    let qr_codec = Arc::new(QrCodec::new(&config.qr_secret, config.qr_freshness_hours)?);

    Ok(AppState {
        config,
        order_repo: store.clone(),
        payment_repo: store.clone(),
        ticket_repo: store.clone(),
        validation_repo: store.clone(),
        outbox_repo: store,
        providers: Arc::new(providers),
        notifier,
        qr_codec,
        metrics: Arc::new(Metrics::default()),
    })
}

fn configure_providers(config: &RuntimeConfig) -> Result<Vec<Arc<dyn PaymentProvider>>> {
    let mut providers: Vec<Arc<dyn PaymentProvider>> = Vec::new();
    if let Some(secret) = &config.paystack_secret_key {
        providers.push(Arc::new(PaystackProvider::new(
            secret,
            None,
            config.provider_timeout_seconds,
        )?));
        info!("paystack provider configured");
    }
    if let Some(secret) = &config.flutterwave_secret_key {
        let webhook_secret = config
            .flutterwave_webhook_secret
            .as_deref()
            .unwrap_or(secret);
        providers.push(Arc::new(FlutterwaveProvider::new(
            secret,
            webhook_secret,
            None,
            config.provider_timeout_seconds,
        )?));
        info!("flutterwave provider configured");
    }
    if providers.is_empty() {
        warn!("no payment provider configured; checkout and webhooks will be refused");
    }
    Ok(providers)
}
