// Check-in request and gate decision shapes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scan presented at the gate.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub qr_payload: String,
    pub validator: String,
    pub location: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// What the gate UI shows on admit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendeeInfo {
    pub owner_name: String,
    pub ticket_type: String,
    pub ticket_number: String,
}

/// Why a scan was refused. `AlreadyUsed` carries the original check-in
/// so staff can resolve disputes at the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DenyReason {
    PayloadExpired,
    NotFound,
    AlreadyUsed {
        validated_at: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        validated_by: Option<String>,
    },
    Cancelled,
    Refunded,
    TransferredAway {
        #[serde(skip_serializing_if = "Option::is_none")]
        current_holder: Option<String>,
    },
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::PayloadExpired => "payload_expired",
            DenyReason::NotFound => "not_found",
            DenyReason::AlreadyUsed { .. } => "already_used",
            DenyReason::Cancelled => "cancelled",
            DenyReason::Refunded => "refunded",
            DenyReason::TransferredAway { .. } => "transferred_away",
        }
    }
}

/// Gate decision, serialized as `{"outcome": "admit" | "deny", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckInOutcome {
    Admit {
        attendee: AttendeeInfo,
        validated_at: DateTime<Utc>,
    },
    Deny {
        reason: DenyReason,
    },
}
