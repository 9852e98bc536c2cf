use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{Order, OutboxMessage, Payment, Ticket, ValidationRecord};
use crate::value_objects::{
    OrderId, OrderStatus, PaymentId, PaymentStatus, ProviderKind, ProviderReference, TicketId,
    TicketStatus,
};

/// Result of a conditional status update. `Applied` means this caller
/// performed the transition; `AlreadyApplied` means the row was already
/// in the target state; `Rejected` means it sat in some other state the
/// transition does not accept. The store never does read-then-write for
/// these, so concurrent callers cannot both see `Applied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    AlreadyApplied,
    Rejected,
}

/// Result of order-keyed ticket issuance. Both variants return the
/// tickets that exist for the order afterwards, so retries can keep
/// working with them.
#[derive(Debug, Clone)]
pub enum IssuanceOutcome {
    Issued(Vec<Ticket>),
    AlreadyIssued(Vec<Ticket>),
}

impl IssuanceOutcome {
    pub fn tickets(&self) -> &[Ticket] {
        match self {
            IssuanceOutcome::Issued(tickets) => tickets,
            IssuanceOutcome::AlreadyIssued(tickets) => tickets,
        }
    }
}

/// Result of the atomic `active -> used` gate update. The loser of a
/// concurrent scan race gets `AlreadyUsed` with the winning check-in's
/// timestamp and validator.
#[derive(Debug, Clone)]
pub enum CheckInUpdate {
    Admitted(Ticket),
    AlreadyUsed {
        validated_at: DateTime<Utc>,
        validated_by: Option<String>,
    },
    NotActive {
        status: TicketStatus,
    },
    NotFound,
}

/// Result of an in-place holder change.
#[derive(Debug, Clone)]
pub enum TransferUpdate {
    Applied(Ticket),
    Ineligible { status: TicketStatus },
    NotFound,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &Order) -> anyhow::Result<()>;
    async fn find_order(&self, id: OrderId) -> anyhow::Result<Option<Order>>;
    /// Conditional update: `status = to` only while the current status is
    /// in `from`. `at` lands in `fulfilled_at` when the target is
    /// `Fulfilled`.
    async fn transition_order(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> anyhow::Result<TransitionOutcome>;
    async fn ping(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Fails if `(provider, provider_reference)` already exists.
    async fn insert_payment(&self, payment: &Payment) -> anyhow::Result<()>;
    async fn find_payment(&self, id: PaymentId) -> anyhow::Result<Option<Payment>>;
    async fn find_payment_by_reference(
        &self,
        provider: ProviderKind,
        reference: &ProviderReference,
    ) -> anyhow::Result<Option<Payment>>;
    async fn list_payments_for_order(&self, order_id: OrderId) -> anyhow::Result<Vec<Payment>>;
    /// The duplicate-webhook guard. On `Applied` the store also records
    /// `raw_event` and stamps `verified_at`/`refunded_at` according to
    /// the target status.
    async fn transition_payment(
        &self,
        id: PaymentId,
        from: &[PaymentStatus],
        to: PaymentStatus,
        raw_event: &serde_json::Value,
        at: DateTime<Utc>,
    ) -> anyhow::Result<TransitionOutcome>;
    async fn flag_payment_for_review(&self, id: PaymentId) -> anyhow::Result<()>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// The double-issue guard: inserts the batch only if the order has no
    /// tickets yet, otherwise returns what already exists.
    async fn issue_tickets(
        &self,
        order_id: OrderId,
        tickets: &[Ticket],
    ) -> anyhow::Result<IssuanceOutcome>;
    /// Single-ticket insert used for assignment replacements.
    async fn insert_ticket(&self, ticket: &Ticket) -> anyhow::Result<()>;
    async fn find_ticket(&self, id: TicketId) -> anyhow::Result<Option<Ticket>>;
    async fn list_tickets_for_order(&self, order_id: OrderId) -> anyhow::Result<Vec<Ticket>>;
    /// The double-admit guard: `active -> used` plus the one-time
    /// `validated_at`/`validated_by` stamp, as one conditional update.
    async fn check_in_ticket(
        &self,
        id: TicketId,
        validator: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<CheckInUpdate>;
    /// Holder change in place; only while the ticket is `Active` and has
    /// never been validated. Records the previous holder as provenance.
    async fn transfer_ticket(
        &self,
        id: TicketId,
        to_name: &str,
        to_email: &str,
    ) -> anyhow::Result<TransferUpdate>;
    /// Conditional status update for cancel/retire paths. Refuses
    /// tickets that already carry a validation stamp.
    async fn transition_ticket(
        &self,
        id: TicketId,
        from: &[TicketStatus],
        to: TicketStatus,
    ) -> anyhow::Result<TransitionOutcome>;
    /// Refund cascade: every `Active` ticket of the order flips to
    /// `Refunded`. Returns how many were affected; `Used` tickets are
    /// left alone.
    async fn refund_active_tickets(&self, order_id: OrderId) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait ValidationRepository: Send + Sync {
    async fn append_validation(&self, record: &ValidationRecord) -> anyhow::Result<()>;
    /// Most recent first.
    async fn list_validations(&self, limit: usize) -> anyhow::Result<Vec<ValidationRecord>>;
}

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn enqueue(&self, message: &OutboxMessage) -> anyhow::Result<()>;
    /// Pending messages whose `available_at` has passed, oldest first.
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<OutboxMessage>>;
    async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;
    /// Bumps the attempt count and either reschedules (`retry_at`) or,
    /// when `None`, parks the message as permanently failed.
    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()>;
}
