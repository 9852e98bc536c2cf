// Runtime configuration snapshots

/// Validated runtime settings handed to the application layer. Built by
/// the infrastructure config loader; never mutated after startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub bind_addr: String,
    pub api_token: Option<String>,
    pub public_base_url: String,
    pub qr_secret: String,
    pub qr_freshness_hours: i64,
    pub paystack_secret_key: Option<String>,
    pub flutterwave_secret_key: Option<String>,
    pub flutterwave_webhook_secret: Option<String>,
    pub notify_webhook_url: Option<String>,
    pub outbox_poll_seconds: u64,
    pub outbox_batch_limit: usize,
    pub outbox_retry_base_seconds: u64,
    pub outbox_max_attempts: i32,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
    pub provider_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
}
