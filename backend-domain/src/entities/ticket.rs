// Ticket entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::Order;
use crate::value_objects::{OrderId, TicketId, TicketNumber, TicketStatus};

/// A single admit-one credential tied to an Order.
///
/// `validated_at` is written exactly once, by the `active -> used`
/// transition, and is the single source of truth for "already checked
/// in". The holder fields are the only thing a transfer may touch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub order_id: OrderId,
    pub owner_name: String,
    pub owner_email: String,
    pub ticket_type: String,
    pub ticket_number: TicketNumber,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transferred_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Fresh ticket for the order's buyer, issued on payment success.
    pub fn issue(order: &Order) -> Self {
        Self {
            id: TicketId::generate(),
            order_id: order.id,
            owner_name: order.buyer_name.clone(),
            owner_email: order.buyer_email.clone(),
            ticket_type: order.ticket_type.clone(),
            ticket_number: TicketNumber::generate(),
            status: TicketStatus::Active,
            transferred_from: None,
            validated_at: None,
            validated_by: None,
            created_at: Utc::now(),
        }
    }

    /// Replacement ticket minted when an organizer assigns a seat to a
    /// team member. The retired ticket's holder is kept as provenance.
    pub fn reissue(retired: &Ticket, owner_name: &str, owner_email: &str) -> Self {
        Self {
            id: TicketId::generate(),
            order_id: retired.order_id,
            owner_name: owner_name.trim().to_string(),
            owner_email: owner_email.trim().to_lowercase(),
            ticket_type: retired.ticket_type.clone(),
            ticket_number: TicketNumber::generate(),
            status: TicketStatus::Active,
            transferred_from: Some(retired.owner_email.clone()),
            validated_at: None,
            validated_by: None,
            created_at: Utc::now(),
        }
    }
}

/// New holder for a transfer or an organizer assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub to_name: String,
    pub to_email: String,
}

/// A ticket plus a freshly derived QR payload. The payload is only
/// present while the ticket is `Active`; consumed or voided tickets have
/// nothing worth scanning.
#[derive(Debug, Clone, Serialize)]
pub struct TicketWithQr {
    pub ticket: Ticket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
}
