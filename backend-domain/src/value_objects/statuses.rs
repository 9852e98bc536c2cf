// Lifecycle status value objects
//
// Every persisted status is stored as its `as_str` form; `parse` is the
// inverse and rejects anything it does not recognize. Transition validity
// lives here so the repositories and the reconciler share one table.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "fulfilled" => Some(OrderStatus::Fulfilled),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Initialized,
    Pending,
    Successful,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Initialized => "initialized",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Successful => "successful",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "initialized" => Some(PaymentStatus::Initialized),
            "pending" => Some(PaymentStatus::Pending),
            "successful" => Some(PaymentStatus::Successful),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    pub fn valid_transitions(&self) -> &'static [PaymentStatus] {
        match self {
            PaymentStatus::Initialized => &[
                PaymentStatus::Pending,
                PaymentStatus::Successful,
                PaymentStatus::Failed,
            ],
            PaymentStatus::Pending => &[PaymentStatus::Successful, PaymentStatus::Failed],
            PaymentStatus::Successful => &[PaymentStatus::Refunded],
            PaymentStatus::Failed => &[],
            PaymentStatus::Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
    Refunded,
    TransferredOut,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "active",
            TicketStatus::Used => "used",
            TicketStatus::Cancelled => "cancelled",
            TicketStatus::Refunded => "refunded",
            TicketStatus::TransferredOut => "transferred_out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(TicketStatus::Active),
            "used" => Some(TicketStatus::Used),
            "cancelled" => Some(TicketStatus::Cancelled),
            "refunded" => Some(TicketStatus::Refunded),
            "transferred_out" => Some(TicketStatus::TransferredOut),
            _ => None,
        }
    }

    /// Everything except `Active` is final; a ticket never returns to
    /// circulation once it has been consumed, voided, or replaced.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TicketStatus::Active)
    }
}

/// Canonical status carried by a normalized provider webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventStatus {
    Pending,
    Successful,
    Failed,
    Refunded,
}

impl PaymentEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEventStatus::Pending => "pending",
            PaymentEventStatus::Successful => "successful",
            PaymentEventStatus::Failed => "failed",
            PaymentEventStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Delivered,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Delivered => "delivered",
            OutboxStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OutboxStatus::Pending),
            "delivered" => Some(OutboxStatus::Delivered),
            "failed" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_never_overwrites_successful() {
        assert!(!PaymentStatus::Successful.can_transition_to(PaymentStatus::Failed));
        assert!(PaymentStatus::Successful.can_transition_to(PaymentStatus::Refunded));
    }

    #[test]
    fn refund_requires_a_prior_success() {
        assert!(!PaymentStatus::Initialized.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Refunded));
    }

    #[test]
    fn terminal_payment_states_admit_nothing() {
        assert!(PaymentStatus::Failed.valid_transitions().is_empty());
        assert!(PaymentStatus::Refunded.valid_transitions().is_empty());
    }

    #[test]
    fn only_active_tickets_are_live() {
        assert!(!TicketStatus::Active.is_terminal());
        for status in [
            TicketStatus::Used,
            TicketStatus::Cancelled,
            TicketStatus::Refunded,
            TicketStatus::TransferredOut,
        ] {
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            PaymentStatus::Initialized,
            PaymentStatus::Pending,
            PaymentStatus::Successful,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TicketStatus::parse("transferred_out"), Some(TicketStatus::TransferredOut));
        assert_eq!(OrderStatus::parse("unknown"), None);
    }
}
