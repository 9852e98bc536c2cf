// In-memory store
//
// Implements every repository port against process-local Vecs behind a
// single mutex. Used by the test suites and by deployments that run
// without a database_url. Because all tables share one lock, each
// conditional transition is exactly as atomic as its SQL counterpart.

use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use backend_domain::ports::{
    CheckInUpdate, IssuanceOutcome, OrderRepository, OutboxRepository, PaymentRepository,
    TicketRepository, TransferUpdate, TransitionOutcome, ValidationRepository,
};
use backend_domain::{
    Order, OrderId, OrderStatus, OutboxMessage, OutboxStatus, Payment, PaymentId, PaymentStatus,
    ProviderKind, ProviderReference, Ticket, TicketId, TicketStatus, ValidationRecord,
};

#[derive(Default)]
struct Tables {
    orders: Vec<Order>,
    payments: Vec<Payment>,
    tickets: Vec<Ticket>,
    validations: Vec<ValidationRecord>,
    outbox: Vec<OutboxMessage>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| anyhow!("store lock poisoned"))
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> anyhow::Result<()> {
        let mut tables = self.lock()?;
        if tables.orders.iter().any(|existing| existing.id == order.id) {
            return Err(anyhow!("order {} already exists", order.id));
        }
        tables.orders.push(order.clone());
        Ok(())
    }

    async fn find_order(&self, id: OrderId) -> anyhow::Result<Option<Order>> {
        let tables = self.lock()?;
        Ok(tables.orders.iter().find(|order| order.id == id).cloned())
    }

    async fn transition_order(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> anyhow::Result<TransitionOutcome> {
        let mut tables = self.lock()?;
        let Some(order) = tables.orders.iter_mut().find(|order| order.id == id) else {
            return Ok(TransitionOutcome::Rejected);
        };
        if from.contains(&order.status) {
            order.status = to;
            if to == OrderStatus::Fulfilled {
                order.fulfilled_at = Some(at);
            }
            Ok(TransitionOutcome::Applied)
        } else if order.status == to {
            Ok(TransitionOutcome::AlreadyApplied)
        } else {
            Ok(TransitionOutcome::Rejected)
        }
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.lock().map(|_| ())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> anyhow::Result<()> {
        let mut tables = self.lock()?;
        let duplicate = tables.payments.iter().any(|existing| {
            existing.id == payment.id
                || (existing.provider == payment.provider
                    && existing.provider_reference == payment.provider_reference)
        });
        if duplicate {
            return Err(anyhow!(
                "payment reference {} already exists for {}",
                payment.provider_reference,
                payment.provider
            ));
        }
        tables.payments.push(payment.clone());
        Ok(())
    }

    async fn find_payment(&self, id: PaymentId) -> anyhow::Result<Option<Payment>> {
        let tables = self.lock()?;
        Ok(tables
            .payments
            .iter()
            .find(|payment| payment.id == id)
            .cloned())
    }

    async fn find_payment_by_reference(
        &self,
        provider: ProviderKind,
        reference: &ProviderReference,
    ) -> anyhow::Result<Option<Payment>> {
        let tables = self.lock()?;
        Ok(tables
            .payments
            .iter()
            .find(|payment| {
                payment.provider == provider && payment.provider_reference == *reference
            })
            .cloned())
    }

    async fn list_payments_for_order(&self, order_id: OrderId) -> anyhow::Result<Vec<Payment>> {
        let tables = self.lock()?;
        Ok(tables
            .payments
            .iter()
            .filter(|payment| payment.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn transition_payment(
        &self,
        id: PaymentId,
        from: &[PaymentStatus],
        to: PaymentStatus,
        raw_event: &serde_json::Value,
        at: DateTime<Utc>,
    ) -> anyhow::Result<TransitionOutcome> {
        let mut tables = self.lock()?;
        let Some(payment) = tables.payments.iter_mut().find(|payment| payment.id == id) else {
            return Ok(TransitionOutcome::Rejected);
        };
        if from.contains(&payment.status) {
            payment.status = to;
            payment.raw_event = raw_event.clone();
            match to {
                PaymentStatus::Successful => payment.verified_at = Some(at),
                PaymentStatus::Refunded => payment.refunded_at = Some(at),
                _ => {}
            }
            Ok(TransitionOutcome::Applied)
        } else if payment.status == to {
            Ok(TransitionOutcome::AlreadyApplied)
        } else {
            Ok(TransitionOutcome::Rejected)
        }
    }

    async fn flag_payment_for_review(&self, id: PaymentId) -> anyhow::Result<()> {
        let mut tables = self.lock()?;
        let Some(payment) = tables.payments.iter_mut().find(|payment| payment.id == id) else {
            return Err(anyhow!("payment {} not found", id));
        };
        payment.flagged_for_review = true;
        Ok(())
    }
}

#[async_trait]
impl TicketRepository for InMemoryStore {
    async fn issue_tickets(
        &self,
        order_id: OrderId,
        tickets: &[Ticket],
    ) -> anyhow::Result<IssuanceOutcome> {
        let mut tables = self.lock()?;
        let existing: Vec<Ticket> = tables
            .tickets
            .iter()
            .filter(|ticket| ticket.order_id == order_id)
            .cloned()
            .collect();
        if !existing.is_empty() {
            return Ok(IssuanceOutcome::AlreadyIssued(existing));
        }
        tables.tickets.extend_from_slice(tickets);
        Ok(IssuanceOutcome::Issued(tickets.to_vec()))
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> anyhow::Result<()> {
        let mut tables = self.lock()?;
        if tables.tickets.iter().any(|existing| existing.id == ticket.id) {
            return Err(anyhow!("ticket {} already exists", ticket.id));
        }
        tables.tickets.push(ticket.clone());
        Ok(())
    }

    async fn find_ticket(&self, id: TicketId) -> anyhow::Result<Option<Ticket>> {
        let tables = self.lock()?;
        Ok(tables.tickets.iter().find(|ticket| ticket.id == id).cloned())
    }

    async fn list_tickets_for_order(&self, order_id: OrderId) -> anyhow::Result<Vec<Ticket>> {
        let tables = self.lock()?;
        Ok(tables
            .tickets
            .iter()
            .filter(|ticket| ticket.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn check_in_ticket(
        &self,
        id: TicketId,
        validator: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<CheckInUpdate> {
        let mut tables = self.lock()?;
        let Some(ticket) = tables.tickets.iter_mut().find(|ticket| ticket.id == id) else {
            return Ok(CheckInUpdate::NotFound);
        };
        match ticket.status {
            TicketStatus::Active => {
                ticket.status = TicketStatus::Used;
                ticket.validated_at = Some(at);
                ticket.validated_by = Some(validator.to_string());
                Ok(CheckInUpdate::Admitted(ticket.clone()))
            }
            TicketStatus::Used => Ok(CheckInUpdate::AlreadyUsed {
                validated_at: ticket.validated_at.unwrap_or(at),
                validated_by: ticket.validated_by.clone(),
            }),
            status => Ok(CheckInUpdate::NotActive { status }),
        }
    }

    async fn transfer_ticket(
        &self,
        id: TicketId,
        to_name: &str,
        to_email: &str,
    ) -> anyhow::Result<TransferUpdate> {
        let mut tables = self.lock()?;
        let Some(ticket) = tables.tickets.iter_mut().find(|ticket| ticket.id == id) else {
            return Ok(TransferUpdate::NotFound);
        };
        if ticket.status != TicketStatus::Active || ticket.validated_at.is_some() {
            return Ok(TransferUpdate::Ineligible {
                status: ticket.status,
            });
        }
        ticket.transferred_from = Some(ticket.owner_email.clone());
        ticket.owner_name = to_name.to_string();
        ticket.owner_email = to_email.to_string();
        Ok(TransferUpdate::Applied(ticket.clone()))
    }

    async fn transition_ticket(
        &self,
        id: TicketId,
        from: &[TicketStatus],
        to: TicketStatus,
    ) -> anyhow::Result<TransitionOutcome> {
        let mut tables = self.lock()?;
        let Some(ticket) = tables.tickets.iter_mut().find(|ticket| ticket.id == id) else {
            return Ok(TransitionOutcome::Rejected);
        };
        if from.contains(&ticket.status) && ticket.validated_at.is_none() {
            ticket.status = to;
            Ok(TransitionOutcome::Applied)
        } else if ticket.status == to {
            Ok(TransitionOutcome::AlreadyApplied)
        } else {
            Ok(TransitionOutcome::Rejected)
        }
    }

    async fn refund_active_tickets(&self, order_id: OrderId) -> anyhow::Result<u64> {
        let mut tables = self.lock()?;
        let mut refunded = 0u64;
        for ticket in tables
            .tickets
            .iter_mut()
            .filter(|ticket| ticket.order_id == order_id && ticket.status == TicketStatus::Active)
        {
            ticket.status = TicketStatus::Refunded;
            refunded += 1;
        }
        Ok(refunded)
    }
}

#[async_trait]
impl ValidationRepository for InMemoryStore {
    async fn append_validation(&self, record: &ValidationRecord) -> anyhow::Result<()> {
        let mut tables = self.lock()?;
        tables.validations.push(record.clone());
        Ok(())
    }

    async fn list_validations(&self, limit: usize) -> anyhow::Result<Vec<ValidationRecord>> {
        let tables = self.lock()?;
        let mut records: Vec<ValidationRecord> = tables.validations.clone();
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        records.truncate(limit);
        Ok(records)
    }
}

#[async_trait]
impl OutboxRepository for InMemoryStore {
    async fn enqueue(&self, message: &OutboxMessage) -> anyhow::Result<()> {
        let mut tables = self.lock()?;
        tables.outbox.push(message.clone());
        Ok(())
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<OutboxMessage>> {
        let tables = self.lock()?;
        let mut due: Vec<OutboxMessage> = tables
            .outbox
            .iter()
            .filter(|message| message.status == OutboxStatus::Pending && message.available_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.available_at.cmp(&b.available_at));
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        let mut tables = self.lock()?;
        let Some(message) = tables.outbox.iter_mut().find(|message| message.id == id) else {
            return Err(anyhow!("outbox message {} not found", id));
        };
        message.status = OutboxStatus::Delivered;
        message.delivered_at = Some(at);
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        let mut tables = self.lock()?;
        let Some(message) = tables.outbox.iter_mut().find(|message| message.id == id) else {
            return Err(anyhow!("outbox message {} not found", id));
        };
        message.attempts += 1;
        message.last_error = Some(error.to_string());
        match retry_at {
            Some(at) => message.available_at = at,
            None => message.status = OutboxStatus::Failed,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use backend_domain::CheckoutRequest;

    use super::*;

    fn sample_order(quantity: u32) -> Order {
        Order::new(&CheckoutRequest {
            provider: "paystack".to_string(),
            order_id: None,
            buyer_name: "Ada Obi".to_string(),
            buyer_email: "ada@example.com".to_string(),
            buyer_phone: None,
            currency: "NGN".to_string(),
            amount: 250_000 * quantity as i64,
            quantity,
            ticket_type: "general".to_string(),
            metadata: serde_json::Value::Null,
        })
    }

    #[tokio::test]
    async fn payment_success_transition_applies_exactly_once() {
        let store = InMemoryStore::new();
        let order = sample_order(1);
        store.insert_order(&order).await.expect("insert order");
        let payment = Payment::initialize(
            &order,
            ProviderKind::Paystack,
            ProviderReference("ref-1".to_string()),
        );
        store.insert_payment(&payment).await.expect("insert payment");

        let raw = serde_json::json!({"event": "charge.success"});
        let from = [PaymentStatus::Initialized, PaymentStatus::Pending];
        let first = store
            .transition_payment(payment.id, &from, PaymentStatus::Successful, &raw, Utc::now())
            .await
            .expect("first transition");
        assert_eq!(first, TransitionOutcome::Applied);

        let second = store
            .transition_payment(payment.id, &from, PaymentStatus::Successful, &raw, Utc::now())
            .await
            .expect("second transition");
        assert_eq!(second, TransitionOutcome::AlreadyApplied);

        let stored = store
            .find_payment(payment.id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.status, PaymentStatus::Successful);
        assert!(stored.verified_at.is_some());
        assert_eq!(stored.raw_event, raw);
    }

    #[tokio::test]
    async fn duplicate_provider_reference_is_refused() {
        let store = InMemoryStore::new();
        let order = sample_order(1);
        store.insert_order(&order).await.expect("insert order");
        let payment = Payment::initialize(
            &order,
            ProviderKind::Paystack,
            ProviderReference("ref-dup".to_string()),
        );
        store.insert_payment(&payment).await.expect("first insert");

        let clone = Payment::initialize(
            &order,
            ProviderKind::Paystack,
            ProviderReference("ref-dup".to_string()),
        );
        assert!(store.insert_payment(&clone).await.is_err());

        // The same reference under another provider is a different payment.
        let other = Payment::initialize(
            &order,
            ProviderKind::Flutterwave,
            ProviderReference("ref-dup".to_string()),
        );
        store.insert_payment(&other).await.expect("other provider");
    }

    #[tokio::test]
    async fn issuance_inserts_only_while_the_order_is_empty() {
        let store = InMemoryStore::new();
        let order = sample_order(2);
        let batch: Vec<Ticket> = (0..2).map(|_| Ticket::issue(&order)).collect();

        let first = store
            .issue_tickets(order.id, &batch)
            .await
            .expect("first issuance");
        assert!(matches!(first, IssuanceOutcome::Issued(_)));

        let replay: Vec<Ticket> = (0..2).map(|_| Ticket::issue(&order)).collect();
        let second = store
            .issue_tickets(order.id, &replay)
            .await
            .expect("replayed issuance");
        let IssuanceOutcome::AlreadyIssued(existing) = second else {
            panic!("expected AlreadyIssued");
        };
        assert_eq!(existing.len(), 2);
        assert_eq!(
            store
                .list_tickets_for_order(order.id)
                .await
                .expect("list")
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn check_in_consumes_a_ticket_exactly_once() {
        let store = InMemoryStore::new();
        let order = sample_order(1);
        let ticket = Ticket::issue(&order);
        store.insert_ticket(&ticket).await.expect("insert");

        let at = Utc::now();
        let first = store
            .check_in_ticket(ticket.id, "gate-a", at)
            .await
            .expect("first scan");
        let CheckInUpdate::Admitted(admitted) = first else {
            panic!("expected Admitted");
        };
        assert_eq!(admitted.status, TicketStatus::Used);
        assert_eq!(admitted.validated_at, Some(at));
        assert_eq!(admitted.validated_by.as_deref(), Some("gate-a"));

        let second = store
            .check_in_ticket(ticket.id, "gate-b", Utc::now())
            .await
            .expect("second scan");
        let CheckInUpdate::AlreadyUsed {
            validated_at,
            validated_by,
        } = second
        else {
            panic!("expected AlreadyUsed");
        };
        assert_eq!(validated_at, at);
        assert_eq!(validated_by.as_deref(), Some("gate-a"));
    }

    #[tokio::test]
    async fn consumed_tickets_never_return_to_circulation() {
        let store = InMemoryStore::new();
        let order = sample_order(1);
        let ticket = Ticket::issue(&order);
        store.insert_ticket(&ticket).await.expect("insert");
        store
            .check_in_ticket(ticket.id, "gate-a", Utc::now())
            .await
            .expect("scan");

        // No conditional update accepts a Used ticket back to Active.
        let attempt = store
            .transition_ticket(ticket.id, &[TicketStatus::Used], TicketStatus::Active)
            .await
            .expect("transition");
        assert_eq!(attempt, TransitionOutcome::Rejected);

        let transfer = store
            .transfer_ticket(ticket.id, "Bayo", "bayo@example.com")
            .await
            .expect("transfer");
        assert!(matches!(transfer, TransferUpdate::Ineligible { .. }));

        assert_eq!(
            store.refund_active_tickets(order.id).await.expect("refund"),
            0
        );
        let stored = store
            .find_ticket(ticket.id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(stored.status, TicketStatus::Used);
    }

    #[tokio::test]
    async fn refund_cascade_skips_consumed_tickets() {
        let store = InMemoryStore::new();
        let order = sample_order(3);
        let batch: Vec<Ticket> = (0..3).map(|_| Ticket::issue(&order)).collect();
        store
            .issue_tickets(order.id, &batch)
            .await
            .expect("issue");
        store
            .check_in_ticket(batch[0].id, "gate-a", Utc::now())
            .await
            .expect("scan");

        let refunded = store.refund_active_tickets(order.id).await.expect("refund");
        assert_eq!(refunded, 2);

        let tickets = store.list_tickets_for_order(order.id).await.expect("list");
        assert_eq!(
            tickets
                .iter()
                .filter(|ticket| ticket.status == TicketStatus::Used)
                .count(),
            1
        );
        assert_eq!(
            tickets
                .iter()
                .filter(|ticket| ticket.status == TicketStatus::Refunded)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn outbox_retry_scheduling_hides_messages_until_due() {
        let store = InMemoryStore::new();
        let message = OutboxMessage::new(
            "ada@example.com",
            "ticket-issued",
            serde_json::json!({"ticket_number": "TKT-TEST"}),
        );
        store.enqueue(&message).await.expect("enqueue");

        let now = Utc::now();
        assert_eq!(store.fetch_due(now, 10).await.expect("due").len(), 1);

        let retry_at = now + Duration::seconds(60);
        store
            .mark_failed(message.id, "connect refused", Some(retry_at))
            .await
            .expect("mark failed");
        assert!(store.fetch_due(now, 10).await.expect("due").is_empty());

        let later = retry_at + Duration::seconds(1);
        let due = store.fetch_due(later, 10).await.expect("due");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].attempts, 1);
        assert_eq!(due[0].last_error.as_deref(), Some("connect refused"));

        store
            .mark_failed(message.id, "gave up", None)
            .await
            .expect("park");
        assert!(store.fetch_due(later, 10).await.expect("due").is_empty());
    }

    #[tokio::test]
    async fn validation_log_returns_most_recent_first() {
        let store = InMemoryStore::new();
        for index in 0..3 {
            let mut record =
                ValidationRecord::new(&format!("TKT-{index}"), "admitted", "gate-a", "main", None);
            record.recorded_at = Utc::now() + Duration::seconds(index);
            store.append_validation(&record).await.expect("append");
        }

        let log = store.list_validations(2).await.expect("list");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].ticket_number, "TKT-2");
        assert_eq!(log[1].ticket_number, "TKT-1");
    }
}
