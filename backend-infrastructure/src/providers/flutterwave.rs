// Flutterwave adapter
//
// initialize: POST /v3/payments with a merchant-minted tx_ref; the
// buyer is sent to the hosted link in the response. Flutterwave deals
// in major units, so amounts are converted at this boundary and
// nowhere else. Webhooks are authenticated by the verif-hash header,
// which must equal the configured webhook secret.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use backend_domain::ports::{PaymentProvider, ProviderError};
use backend_domain::{
    CheckoutSession, InitializePayment, OrderId, PaymentEvent, PaymentEventStatus, ProviderKind,
    ProviderReference, WebhookRequest,
};

pub const FLUTTERWAVE_HASH_HEADER: &str = "verif-hash";

const FLUTTERWAVE_BASE_URL: &str = "https://api.flutterwave.com";

pub struct FlutterwaveProvider {
    secret_key: String,
    webhook_secret: String,
    base_url: String,
    client: Client,
}

impl FlutterwaveProvider {
    pub fn new(
        secret_key: &str,
        webhook_secret: &str,
        base_url: Option<&str>,
        timeout_seconds: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(1)))
            .build()?;
        Ok(Self {
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.to_string(),
            base_url: base_url
                .unwrap_or(FLUTTERWAVE_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client,
        })
    }
}

/// Minor units to the "2500.00" form the payments API expects.
fn to_major_units(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, (minor % 100).abs())
}

/// Major units from a webhook back to minor. Flutterwave sends plain
/// JSON numbers, sometimes fractional.
fn to_minor_units(major: f64) -> i64 {
    (major * 100.0).round() as i64
}

#[derive(Debug, Deserialize)]
struct PaymentsResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<PaymentsData>,
}

#[derive(Debug, Deserialize)]
struct PaymentsData {
    link: String,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    #[serde(default)]
    tx_ref: Option<String>,
    // Older payload revisions camel-case the field.
    #[serde(default, rename = "txRef")]
    tx_ref_compat: Option<String>,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    amount_refunded: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    customer: Option<WebhookCustomer>,
    #[serde(default)]
    meta: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WebhookCustomer {
    #[serde(default)]
    email: Option<String>,
}

fn transport_error(context: &str, err: reqwest::Error) -> ProviderError {
    ProviderError::Unavailable(format!("{context}: {err}"))
}

fn order_id_from_meta(meta: Option<&serde_json::Value>) -> Option<OrderId> {
    let text = meta?.get("order_id")?.as_str()?;
    Uuid::try_parse(text).ok().map(OrderId)
}

#[async_trait]
impl PaymentProvider for FlutterwaveProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Flutterwave
    }

    fn matches(&self, request: &WebhookRequest) -> bool {
        request.header(FLUTTERWAVE_HASH_HEADER).is_some()
    }

    async fn initialize(
        &self,
        request: &InitializePayment,
    ) -> Result<CheckoutSession, ProviderError> {
        let tx_ref = format!("usher-{}", Uuid::new_v4().simple());
        let body = json!({
            "tx_ref": tx_ref,
            "amount": to_major_units(request.amount),
            "currency": request.currency,
            "customer": {
                "email": request.customer_email,
                "name": request.customer_name,
            },
            "meta": {
                "order_id": request.order_id,
                "context": request.metadata,
            },
        });
        let response = self
            .client
            .post(format!("{}/v3/payments", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error("flutterwave initialize", err))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProviderError::Unavailable(format!(
                "flutterwave responded {status}"
            )));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::InvalidRequest(format!(
                "flutterwave responded {status}: {detail}"
            )));
        }

        let parsed: PaymentsResponse = response
            .json()
            .await
            .map_err(|err| transport_error("flutterwave initialize response", err))?;
        if parsed.status != "success" {
            return Err(ProviderError::InvalidRequest(
                parsed
                    .message
                    .unwrap_or_else(|| "flutterwave declined the initialization".to_string()),
            ));
        }
        let data = parsed.data.ok_or_else(|| {
            ProviderError::Unavailable("flutterwave response missing data".to_string())
        })?;

        Ok(CheckoutSession {
            reference: ProviderReference(tx_ref),
            redirect_url: data.link,
        })
    }

    fn verify_signature(&self, request: &WebhookRequest) -> bool {
        let Some(provided) = request.header(FLUTTERWAVE_HASH_HEADER) else {
            return false;
        };
        if self.webhook_secret.is_empty() {
            return false;
        }
        provided
            .trim()
            .as_bytes()
            .ct_eq(self.webhook_secret.as_bytes())
            .unwrap_u8()
            == 1
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<PaymentEvent, ProviderError> {
        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|err| ProviderError::MalformedPayload(err.to_string()))?;
        let envelope: WebhookEnvelope = serde_json::from_value(raw.clone())
            .map_err(|err| ProviderError::MalformedPayload(err.to_string()))?;

        let data = envelope.data;
        let status = match envelope.event.as_str() {
            "charge.completed" => match data.status.as_deref().unwrap_or_default() {
                "successful" => PaymentEventStatus::Successful,
                "failed" => PaymentEventStatus::Failed,
                "pending" => PaymentEventStatus::Pending,
                other => {
                    return Err(ProviderError::UnsupportedEvent(format!(
                        "charge.completed with status '{other}'"
                    )))
                }
            },
            "refund.completed" => PaymentEventStatus::Refunded,
            other => return Err(ProviderError::UnsupportedEvent(other.to_string())),
        };

        let reference = data
            .tx_ref
            .or(data.tx_ref_compat)
            .filter(|reference| !reference.trim().is_empty())
            .ok_or_else(|| ProviderError::MalformedPayload("missing tx_ref".to_string()))?;
        let amount = data.amount.or(data.amount_refunded).unwrap_or_default();

        Ok(PaymentEvent {
            provider: ProviderKind::Flutterwave,
            reference: ProviderReference(reference),
            status,
            amount: to_minor_units(amount),
            currency: data.currency.unwrap_or_default(),
            customer_email: data.customer.and_then(|customer| customer.email),
            order_id: order_id_from_meta(data.meta.as_ref()),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> FlutterwaveProvider {
        FlutterwaveProvider::new("FLWSECK_TEST-abc", "whsec-123", None, 5).expect("provider")
    }

    fn hashed_request(hash: &str, body: &[u8]) -> WebhookRequest {
        WebhookRequest::new(
            vec![(FLUTTERWAVE_HASH_HEADER.to_string(), hash.to_string())],
            body.to_vec(),
        )
    }

    #[test]
    fn accepts_the_configured_hash_only() {
        let provider = provider();
        assert!(provider.verify_signature(&hashed_request("whsec-123", b"{}")));
        assert!(!provider.verify_signature(&hashed_request("whsec-124", b"{}")));
        assert!(!provider.verify_signature(&hashed_request("", b"{}")));
        assert!(!provider.verify_signature(&WebhookRequest::default()));
    }

    #[test]
    fn an_empty_configured_secret_never_verifies() {
        let open = FlutterwaveProvider::new("FLWSECK_TEST-abc", "", None, 5).expect("provider");
        assert!(!open.verify_signature(&hashed_request("", b"{}")));
    }

    #[test]
    fn matches_on_the_verif_hash_header() {
        let provider = provider();
        assert!(provider.matches(&hashed_request("anything", b"")));
        let other = WebhookRequest::new(
            vec![("x-paystack-signature".to_string(), "00".to_string())],
            Vec::new(),
        );
        assert!(!provider.matches(&other));
    }

    #[test]
    fn parses_a_completed_charge_into_minor_units() {
        let order_id = OrderId::generate();
        let body = serde_json::to_vec(&serde_json::json!({
            "event": "charge.completed",
            "data": {
                "tx_ref": "usher-abc123",
                "flw_ref": "FLW-MOCK-1",
                "amount": 2500.5,
                "currency": "NGN",
                "status": "successful",
                "customer": { "email": "ada@example.com" },
                "meta": { "order_id": order_id },
            }
        }))
        .expect("encode");

        let event = provider().parse_webhook(&body).expect("parse");
        assert_eq!(event.provider, ProviderKind::Flutterwave);
        assert_eq!(event.status, PaymentEventStatus::Successful);
        assert_eq!(event.reference.as_str(), "usher-abc123");
        assert_eq!(event.amount, 250_050);
        assert_eq!(event.order_id, Some(order_id));
    }

    #[test]
    fn failed_charges_and_refunds_map_to_their_statuses() {
        let failed = serde_json::to_vec(&serde_json::json!({
            "event": "charge.completed",
            "data": { "tx_ref": "usher-f1", "amount": 100, "currency": "NGN", "status": "failed" }
        }))
        .expect("encode");
        let event = provider().parse_webhook(&failed).expect("parse");
        assert_eq!(event.status, PaymentEventStatus::Failed);

        let refund = serde_json::to_vec(&serde_json::json!({
            "event": "refund.completed",
            "data": { "txRef": "usher-f1", "amount_refunded": 100 }
        }))
        .expect("encode");
        let event = provider().parse_webhook(&refund).expect("parse");
        assert_eq!(event.status, PaymentEventStatus::Refunded);
        assert_eq!(event.reference.as_str(), "usher-f1");
        assert_eq!(event.amount, 10_000);
    }

    #[test]
    fn unknown_events_and_statuses_are_unsupported() {
        let event = serde_json::to_vec(&serde_json::json!({
            "event": "transfer.completed",
            "data": { "tx_ref": "usher-t1" }
        }))
        .expect("encode");
        assert!(matches!(
            provider().parse_webhook(&event),
            Err(ProviderError::UnsupportedEvent(_))
        ));

        let odd_status = serde_json::to_vec(&serde_json::json!({
            "event": "charge.completed",
            "data": { "tx_ref": "usher-t2", "status": "reversed" }
        }))
        .expect("encode");
        assert!(matches!(
            provider().parse_webhook(&odd_status),
            Err(ProviderError::UnsupportedEvent(_))
        ));
    }

    #[test]
    fn major_unit_conversion_round_trips_whole_and_fractional_amounts() {
        assert_eq!(to_major_units(250_000), "2500.00");
        assert_eq!(to_major_units(250_050), "2500.50");
        assert_eq!(to_major_units(99), "0.99");
        assert_eq!(to_minor_units(2500.0), 250_000);
        assert_eq!(to_minor_units(0.99), 99);
    }
}
