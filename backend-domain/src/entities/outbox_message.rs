// Outbox message entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::OutboxStatus;

/// Durable "something should be sent" fact. Issuance and transfers write
/// one of these in the same breath as the state change; the relay worker
/// owns delivery, retries, and giving up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub recipient: String,
    pub template: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub available_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn new(recipient: &str, template: &str, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.to_string(),
            template: template.to_string(),
            payload,
            status: OutboxStatus::Pending,
            attempts: 0,
            available_at: now,
            delivered_at: None,
            last_error: None,
            created_at: now,
        }
    }
}
