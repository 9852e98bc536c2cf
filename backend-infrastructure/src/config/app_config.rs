use std::env;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use backend_domain::{DbConfig, RuntimeConfig};

/// Placeholder baked into the defaults so a bare checkout boots. Real
/// deployments must override it; `load` warns loudly when they don't.
pub const DEFAULT_QR_SECRET: &str = "change-me-dev-only";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub api_token: Option<String>,
    pub public_base_url: String,
    pub qr_secret: String,
    pub qr_freshness_hours: i64,
    pub paystack_secret_key: Option<String>,
    pub flutterwave_secret_key: Option<String>,
    pub flutterwave_webhook_secret: Option<String>,
    pub notify_webhook_url: Option<String>,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub outbox_poll_seconds: u64,
    pub outbox_batch_limit: usize,
    pub outbox_retry_base_seconds: u64,
    pub outbox_max_attempts: i32,
    pub max_body_bytes: u64,
    pub request_timeout_seconds: u64,
    pub provider_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8470".to_string(),
            api_token: None,
            public_base_url: "http://127.0.0.1:8470".to_string(),
            qr_secret: DEFAULT_QR_SECRET.to_string(),
            qr_freshness_hours: 24,
            paystack_secret_key: None,
            flutterwave_secret_key: None,
            flutterwave_webhook_secret: None,
            notify_webhook_url: None,
            database_url: None,
            db_max_connections: 5,
            outbox_poll_seconds: 10,
            outbox_batch_limit: 32,
            outbox_retry_base_seconds: 30,
            outbox_max_attempts: 8,
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 15,
            provider_timeout_seconds: 10,
        }
    }
}

impl AppConfig {
    pub async fn load() -> Result<Self> {
        let path = env::var("USHER_CONFIG").unwrap_or_else(|_| "./config.toml".to_string());
        let file_path = Path::new(&path);
        let mut config = if file_path.exists() {
            let content = fs::read_to_string(file_path).await?;
            toml::from_str::<AppConfig>(&content)?
        } else {
            warn!("config.toml not found, using defaults");
            AppConfig::default()
        };
        config.apply_env_overrides();
        config.normalize();
        config.validate()?;
        if config.qr_secret == DEFAULT_QR_SECRET {
            warn!("qr_secret is the built-in default; QR payloads are forgeable until it is set");
        }
        Ok(config)
    }

    pub fn normalize(&mut self) {
        if let Some(api_token) = &self.api_token {
            if api_token.trim().is_empty() {
                self.api_token = None;
            }
        }
        if let Some(key) = &self.paystack_secret_key {
            if key.trim().is_empty() {
                self.paystack_secret_key = None;
            }
        }
        if let Some(key) = &self.flutterwave_secret_key {
            if key.trim().is_empty() {
                self.flutterwave_secret_key = None;
            }
        }
        if let Some(secret) = &self.flutterwave_webhook_secret {
            if secret.trim().is_empty() {
                self.flutterwave_webhook_secret = None;
            }
        }
        if let Some(url) = &self.notify_webhook_url {
            if url.trim().is_empty() {
                self.notify_webhook_url = None;
            }
        }
        if let Some(url) = &self.database_url {
            if url.trim().is_empty() {
                self.database_url = None;
            }
        }
        while self.public_base_url.ends_with('/') {
            self.public_base_url.pop();
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|err| anyhow!("invalid bind_addr: {}", err))?;
        if self.public_base_url.trim().is_empty() {
            return Err(anyhow!("public_base_url must not be empty"));
        }
        if self.qr_secret.trim().is_empty() {
            return Err(anyhow!("qr_secret must not be empty"));
        }
        if self.qr_freshness_hours <= 0 {
            return Err(anyhow!("qr_freshness_hours must be greater than 0"));
        }
        if self.outbox_poll_seconds == 0 {
            return Err(anyhow!("outbox_poll_seconds must be greater than 0"));
        }
        if self.outbox_batch_limit == 0 {
            return Err(anyhow!("outbox_batch_limit must be greater than 0"));
        }
        if self.outbox_max_attempts <= 0 {
            return Err(anyhow!("outbox_max_attempts must be greater than 0"));
        }
        if self.max_body_bytes == 0 {
            return Err(anyhow!("max_body_bytes must be greater than 0"));
        }
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            bind_addr: self.bind_addr.clone(),
            api_token: self.api_token.clone(),
            public_base_url: self.public_base_url.clone(),
            qr_secret: self.qr_secret.clone(),
            qr_freshness_hours: self.qr_freshness_hours,
            paystack_secret_key: self.paystack_secret_key.clone(),
            flutterwave_secret_key: self.flutterwave_secret_key.clone(),
            flutterwave_webhook_secret: self.flutterwave_webhook_secret.clone(),
            notify_webhook_url: self.notify_webhook_url.clone(),
            outbox_poll_seconds: self.outbox_poll_seconds,
            outbox_batch_limit: self.outbox_batch_limit,
            outbox_retry_base_seconds: self.outbox_retry_base_seconds,
            outbox_max_attempts: self.outbox_max_attempts,
            max_body_bytes: self.max_body_bytes,
            request_timeout_seconds: self.request_timeout_seconds,
            provider_timeout_seconds: self.provider_timeout_seconds,
        }
    }

    pub fn to_db_config(&self) -> DbConfig {
        DbConfig {
            database_url: self.database_url.clone(),
            max_connections: self.db_max_connections,
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("USHER_BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Ok(value) = env::var("USHER_API_TOKEN") {
            self.api_token = Some(value);
        }
        if let Ok(value) = env::var("USHER_PUBLIC_BASE_URL") {
            self.public_base_url = value;
        }
        if let Ok(value) = env::var("USHER_QR_SECRET") {
            self.qr_secret = value;
        }
        if let Ok(value) = env::var("USHER_QR_FRESHNESS_HOURS") {
            self.qr_freshness_hours = value.parse().unwrap_or(self.qr_freshness_hours);
        }
        if let Ok(value) = env::var("USHER_PAYSTACK_SECRET_KEY") {
            self.paystack_secret_key = Some(value);
        }
        if let Ok(value) = env::var("USHER_FLUTTERWAVE_SECRET_KEY") {
            self.flutterwave_secret_key = Some(value);
        }
        if let Ok(value) = env::var("USHER_FLUTTERWAVE_WEBHOOK_SECRET") {
            self.flutterwave_webhook_secret = Some(value);
        }
        if let Ok(value) = env::var("USHER_NOTIFY_WEBHOOK_URL") {
            self.notify_webhook_url = Some(value);
        }
        if let Ok(value) = env::var("USHER_DATABASE_URL") {
            self.database_url = Some(value);
        }
        if let Ok(value) = env::var("USHER_DB_MAX_CONNECTIONS") {
            self.db_max_connections = value.parse().unwrap_or(self.db_max_connections);
        }
        if let Ok(value) = env::var("USHER_OUTBOX_POLL_SECONDS") {
            self.outbox_poll_seconds = value.parse().unwrap_or(self.outbox_poll_seconds);
        }
        if let Ok(value) = env::var("USHER_OUTBOX_BATCH_LIMIT") {
            self.outbox_batch_limit = value.parse().unwrap_or(self.outbox_batch_limit);
        }
        if let Ok(value) = env::var("USHER_OUTBOX_RETRY_BASE_SECONDS") {
            self.outbox_retry_base_seconds =
                value.parse().unwrap_or(self.outbox_retry_base_seconds);
        }
        if let Ok(value) = env::var("USHER_OUTBOX_MAX_ATTEMPTS") {
            self.outbox_max_attempts = value.parse().unwrap_or(self.outbox_max_attempts);
        }
        if let Ok(value) = env::var("USHER_MAX_BODY_BYTES") {
            self.max_body_bytes = value.parse().unwrap_or(self.max_body_bytes);
        }
        if let Ok(value) = env::var("USHER_REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = value.parse().unwrap_or(self.request_timeout_seconds);
        }
        if let Ok(value) = env::var("USHER_PROVIDER_TIMEOUT_SECONDS") {
            self.provider_timeout_seconds = value.parse().unwrap_or(self.provider_timeout_seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = AppConfig::default();
        config.validate().expect("defaults must validate");
        assert!(config.to_db_config().database_url.is_none());
    }

    #[test]
    fn normalize_drops_blank_secrets_and_trailing_slashes() {
        let mut config = AppConfig {
            api_token: Some("   ".to_string()),
            paystack_secret_key: Some(String::new()),
            database_url: Some(" ".to_string()),
            public_base_url: "https://tickets.example.com///".to_string(),
            ..AppConfig::default()
        };
        config.normalize();

        assert!(config.api_token.is_none());
        assert!(config.paystack_secret_key.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.public_base_url, "https://tickets.example.com");
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = AppConfig::default();
        config.qr_freshness_hours = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.bind_addr = "not-an-addr".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.qr_secret = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
