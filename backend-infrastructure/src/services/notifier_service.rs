// Notification delivery
//
// The relay hands every due outbox message to a Notifier; this module
// holds the two implementations. WebhookNotifier posts the message to a
// configured HTTP endpoint (a mail bridge, a Slack hook, whatever the
// deployment wires up). NoopNotifier stands in when no endpoint is
// configured and in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use backend_domain::ports::Notifier;

pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout_seconds: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(3)))
            .build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        recipient: &str,
        template: &str,
        payload: &serde_json::Value,
    ) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&json!({
                "recipient": recipient,
                "template": template,
                "data": payload,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Accepts everything without leaving the process.
#[derive(Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(
        &self,
        recipient: &str,
        template: &str,
        _payload: &serde_json::Value,
    ) -> anyhow::Result<()> {
        debug!("dropping '{}' notification for {}", template, recipient);
        Ok(())
    }
}
