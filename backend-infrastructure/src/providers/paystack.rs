// Paystack adapter
//
// initialize: POST /transaction/initialize with the secret key as a
// bearer token. Amounts stay in minor units (kobo) on the wire.
// Webhooks carry an HMAC-SHA512 of the raw body, hex encoded, in
// x-paystack-signature.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha512;
use uuid::Uuid;

use backend_domain::ports::{PaymentProvider, ProviderError};
use backend_domain::{
    CheckoutSession, InitializePayment, OrderId, PaymentEvent, PaymentEventStatus, ProviderKind,
    ProviderReference, WebhookRequest,
};

pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

const PAYSTACK_BASE_URL: &str = "https://api.paystack.co";

type HmacSha512 = Hmac<Sha512>;

pub struct PaystackProvider {
    secret_key: String,
    base_url: String,
    client: Client,
}

impl PaystackProvider {
    /// `base_url` overrides the live API endpoint, for tests pointed at
    /// a local stub.
    pub fn new(
        secret_key: &str,
        base_url: Option<&str>,
        timeout_seconds: u64,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.max(1)))
            .build()?;
        Ok(Self {
            secret_key: secret_key.to_string(),
            base_url: base_url
                .unwrap_or(PAYSTACK_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<InitializeData>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    #[serde(default)]
    reference: Option<String>,
    // Refund events name the charge they unwind differently.
    #[serde(default)]
    transaction_reference: Option<String>,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    customer: Option<WebhookCustomer>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WebhookCustomer {
    #[serde(default)]
    email: Option<String>,
}

fn transport_error(context: &str, err: reqwest::Error) -> ProviderError {
    ProviderError::Unavailable(format!("{context}: {err}"))
}

fn order_id_from_metadata(metadata: Option<&serde_json::Value>) -> Option<OrderId> {
    let text = metadata?.get("order_id")?.as_str()?;
    Uuid::try_parse(text).ok().map(OrderId)
}

#[async_trait]
impl PaymentProvider for PaystackProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Paystack
    }

    fn matches(&self, request: &WebhookRequest) -> bool {
        request.header(PAYSTACK_SIGNATURE_HEADER).is_some()
    }

    async fn initialize(
        &self,
        request: &InitializePayment,
    ) -> Result<CheckoutSession, ProviderError> {
        let body = json!({
            "email": request.customer_email,
            "amount": request.amount,
            "currency": request.currency,
            "metadata": {
                "order_id": request.order_id,
                "customer_name": request.customer_name,
                "context": request.metadata,
            },
        });
        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error("paystack initialize", err))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProviderError::Unavailable(format!(
                "paystack responded {status}"
            )));
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::InvalidRequest(format!(
                "paystack responded {status}: {detail}"
            )));
        }

        let parsed: InitializeResponse = response
            .json()
            .await
            .map_err(|err| transport_error("paystack initialize response", err))?;
        if !parsed.status {
            return Err(ProviderError::InvalidRequest(
                parsed
                    .message
                    .unwrap_or_else(|| "paystack declined the initialization".to_string()),
            ));
        }
        let data = parsed.data.ok_or_else(|| {
            ProviderError::Unavailable("paystack response missing data".to_string())
        })?;

        Ok(CheckoutSession {
            reference: ProviderReference(data.reference),
            redirect_url: data.authorization_url,
        })
    }

    fn verify_signature(&self, request: &WebhookRequest) -> bool {
        let Some(signature) = request.header(PAYSTACK_SIGNATURE_HEADER) else {
            return false;
        };
        let Ok(provided) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha512::new_from_slice(self.secret_key.as_bytes()) else {
            return false;
        };
        mac.update(&request.body);
        // verify_slice is the constant-time comparison.
        mac.verify_slice(&provided).is_ok()
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<PaymentEvent, ProviderError> {
        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|err| ProviderError::MalformedPayload(err.to_string()))?;
        let envelope: WebhookEnvelope = serde_json::from_value(raw.clone())
            .map_err(|err| ProviderError::MalformedPayload(err.to_string()))?;

        let status = match envelope.event.as_str() {
            "charge.success" => PaymentEventStatus::Successful,
            "charge.failed" => PaymentEventStatus::Failed,
            "refund.processed" => PaymentEventStatus::Refunded,
            other => return Err(ProviderError::UnsupportedEvent(other.to_string())),
        };

        let data = envelope.data;
        let reference = data
            .reference
            .or(data.transaction_reference)
            .filter(|reference| !reference.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::MalformedPayload("missing transaction reference".to_string())
            })?;

        Ok(PaymentEvent {
            provider: ProviderKind::Paystack,
            reference: ProviderReference(reference),
            status,
            amount: data.amount,
            currency: data.currency,
            customer_email: data.customer.and_then(|customer| customer.email),
            order_id: order_id_from_metadata(data.metadata.as_ref()),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> PaystackProvider {
        PaystackProvider::new("sk_test_abc", None, 5).expect("provider")
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).expect("key");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_request(body: &[u8]) -> WebhookRequest {
        WebhookRequest::new(
            vec![(
                PAYSTACK_SIGNATURE_HEADER.to_string(),
                sign("sk_test_abc", body),
            )],
            body.to_vec(),
        )
    }

    #[test]
    fn accepts_a_correctly_signed_body() {
        let body = br#"{"event":"charge.success"}"#;
        assert!(provider().verify_signature(&signed_request(body)));
    }

    #[test]
    fn rejects_a_tampered_body() {
        let mut request = signed_request(br#"{"event":"charge.success","data":{"amount":1}}"#);
        request.body = br#"{"event":"charge.success","data":{"amount":1000000}}"#.to_vec();
        assert!(!provider().verify_signature(&request));
    }

    #[test]
    fn rejects_a_signature_made_with_another_key() {
        let body = br#"{"event":"charge.success"}"#;
        let request = WebhookRequest::new(
            vec![(
                PAYSTACK_SIGNATURE_HEADER.to_string(),
                sign("sk_test_other", body),
            )],
            body.to_vec(),
        );
        assert!(!provider().verify_signature(&request));
    }

    #[test]
    fn rejects_missing_or_non_hex_signatures() {
        let body = br#"{}"#;
        let unsigned = WebhookRequest::new(Vec::new(), body.to_vec());
        assert!(!provider().verify_signature(&unsigned));

        let garbled = WebhookRequest::new(
            vec![(PAYSTACK_SIGNATURE_HEADER.to_string(), "zzzz".to_string())],
            body.to_vec(),
        );
        assert!(!provider().verify_signature(&garbled));
    }

    #[test]
    fn header_match_is_case_insensitive() {
        let request = WebhookRequest::new(
            vec![("X-Paystack-Signature".to_string(), "00".to_string())],
            Vec::new(),
        );
        assert!(provider().matches(&request));
        assert!(!provider().matches(&WebhookRequest::default()));
    }

    #[test]
    fn parses_a_charge_success_event() {
        let order_id = OrderId::generate();
        let body = serde_json::to_vec(&serde_json::json!({
            "event": "charge.success",
            "data": {
                "reference": "ps_ref_1",
                "amount": 250_000,
                "currency": "NGN",
                "status": "success",
                "customer": { "email": "ada@example.com" },
                "metadata": { "order_id": order_id },
            }
        }))
        .expect("encode");

        let event = provider().parse_webhook(&body).expect("parse");
        assert_eq!(event.provider, ProviderKind::Paystack);
        assert_eq!(event.status, PaymentEventStatus::Successful);
        assert_eq!(event.reference.as_str(), "ps_ref_1");
        assert_eq!(event.amount, 250_000);
        assert_eq!(event.currency, "NGN");
        assert_eq!(event.customer_email.as_deref(), Some("ada@example.com"));
        assert_eq!(event.order_id, Some(order_id));
    }

    #[test]
    fn parses_failure_and_refund_events() {
        let failed = serde_json::to_vec(&serde_json::json!({
            "event": "charge.failed",
            "data": { "reference": "ps_ref_2", "amount": 1000, "currency": "NGN" }
        }))
        .expect("encode");
        let event = provider().parse_webhook(&failed).expect("parse");
        assert_eq!(event.status, PaymentEventStatus::Failed);

        let refund = serde_json::to_vec(&serde_json::json!({
            "event": "refund.processed",
            "data": { "transaction_reference": "ps_ref_2", "amount": 1000, "currency": "NGN" }
        }))
        .expect("encode");
        let event = provider().parse_webhook(&refund).expect("parse");
        assert_eq!(event.status, PaymentEventStatus::Refunded);
        assert_eq!(event.reference.as_str(), "ps_ref_2");
    }

    #[test]
    fn unsupported_events_are_named() {
        let body = serde_json::to_vec(&serde_json::json!({
            "event": "subscription.create",
            "data": { "reference": "sub_1" }
        }))
        .expect("encode");
        let err = provider().parse_webhook(&body).expect_err("unsupported");
        assert!(matches!(err, ProviderError::UnsupportedEvent(name) if name == "subscription.create"));
    }

    #[test]
    fn malformed_payloads_are_rejected_as_such() {
        let err = provider()
            .parse_webhook(b"not json")
            .expect_err("not json");
        assert!(matches!(err, ProviderError::MalformedPayload(_)));

        let missing_reference = serde_json::to_vec(&serde_json::json!({
            "event": "charge.success",
            "data": { "amount": 1000 }
        }))
        .expect("encode");
        let err = provider()
            .parse_webhook(&missing_reference)
            .expect_err("no reference");
        assert!(matches!(err, ProviderError::MalformedPayload(_)));
    }

    #[test]
    fn metadata_without_a_parsable_order_id_yields_none() {
        let body = serde_json::to_vec(&serde_json::json!({
            "event": "charge.success",
            "data": {
                "reference": "ps_ref_3",
                "amount": 1000,
                "currency": "NGN",
                "metadata": { "order_id": "not-a-uuid" },
            }
        }))
        .expect("encode");
        let event = provider().parse_webhook(&body).expect("parse");
        assert_eq!(event.order_id, None);
    }
}
