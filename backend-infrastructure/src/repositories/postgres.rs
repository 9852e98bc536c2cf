// Postgres store
//
// Every guarded transition is a single conditional UPDATE whose WHERE
// clause carries the expected source statuses; the row count decides the
// outcome. No SELECT-then-UPDATE anywhere, so concurrent webhook or scan
// deliveries race on the database row, not in this process.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use backend_domain::ports::{
    CheckInUpdate, IssuanceOutcome, OrderRepository, OutboxRepository, PaymentRepository,
    TicketRepository, TransferUpdate, TransitionOutcome, ValidationRepository,
};
use backend_domain::{
    Order, OrderId, OrderStatus, OutboxMessage, OutboxStatus, Payment, PaymentId, PaymentStatus,
    ProviderKind, ProviderReference, Ticket, TicketId, TicketNumber, TicketStatus,
    ValidationRecord,
};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .context("connecting to postgres")?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the tables on startup when they do not exist yet.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id UUID PRIMARY KEY,
                buyer_name TEXT NOT NULL,
                buyer_email TEXT NOT NULL,
                buyer_phone TEXT,
                currency TEXT NOT NULL,
                total_amount BIGINT NOT NULL,
                quantity INTEGER NOT NULL,
                ticket_type TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                fulfilled_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS payments (
                id UUID PRIMARY KEY,
                order_id UUID NOT NULL,
                provider TEXT NOT NULL,
                provider_reference TEXT NOT NULL,
                amount BIGINT NOT NULL,
                currency TEXT NOT NULL,
                status TEXT NOT NULL,
                flagged_for_review BOOLEAN NOT NULL DEFAULT FALSE,
                raw_event JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                verified_at TIMESTAMPTZ,
                refunded_at TIMESTAMPTZ,
                UNIQUE (provider, provider_reference)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id UUID PRIMARY KEY,
                order_id UUID NOT NULL,
                owner_name TEXT NOT NULL,
                owner_email TEXT NOT NULL,
                ticket_type TEXT NOT NULL,
                ticket_number TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL,
                transferred_from TEXT,
                validated_at TIMESTAMPTZ,
                validated_by TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_tickets_order_id ON tickets (order_id)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS validation_records (
                id UUID PRIMARY KEY,
                ticket_number TEXT NOT NULL,
                outcome TEXT NOT NULL,
                validator TEXT NOT NULL,
                location TEXT NOT NULL,
                notes TEXT,
                recorded_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS outbox_messages (
                id UUID PRIMARY KEY,
                recipient TEXT NOT NULL,
                template TEXT NOT NULL,
                payload JSONB NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                available_at TIMESTAMPTZ NOT NULL,
                delivered_at TIMESTAMPTZ,
                last_error TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("creating schema")?;
        }
        Ok(())
    }
}

fn status_strings<S: Copy>(statuses: &[S], as_str: fn(&S) -> &'static str) -> Vec<String> {
    statuses
        .iter()
        .map(|status| as_str(status).to_string())
        .collect()
}

fn row_to_order(row: &PgRow) -> anyhow::Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId(row.try_get("id")?),
        buyer_name: row.try_get("buyer_name")?,
        buyer_email: row.try_get("buyer_email")?,
        buyer_phone: row.try_get("buyer_phone")?,
        currency: row.try_get("currency")?,
        total_amount: row.try_get("total_amount")?,
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        ticket_type: row.try_get("ticket_type")?,
        status: OrderStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown order status '{status}'"))?,
        created_at: row.try_get("created_at")?,
        fulfilled_at: row.try_get("fulfilled_at")?,
    })
}

fn row_to_payment(row: &PgRow) -> anyhow::Result<Payment> {
    let provider: String = row.try_get("provider")?;
    let status: String = row.try_get("status")?;
    Ok(Payment {
        id: PaymentId(row.try_get("id")?),
        order_id: OrderId(row.try_get("order_id")?),
        provider: ProviderKind::parse(&provider)
            .ok_or_else(|| anyhow!("unknown provider '{provider}'"))?,
        provider_reference: ProviderReference(row.try_get("provider_reference")?),
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        status: PaymentStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown payment status '{status}'"))?,
        flagged_for_review: row.try_get("flagged_for_review")?,
        raw_event: row.try_get("raw_event")?,
        created_at: row.try_get("created_at")?,
        verified_at: row.try_get("verified_at")?,
        refunded_at: row.try_get("refunded_at")?,
    })
}

fn row_to_ticket(row: &PgRow) -> anyhow::Result<Ticket> {
    let status: String = row.try_get("status")?;
    Ok(Ticket {
        id: TicketId(row.try_get("id")?),
        order_id: OrderId(row.try_get("order_id")?),
        owner_name: row.try_get("owner_name")?,
        owner_email: row.try_get("owner_email")?,
        ticket_type: row.try_get("ticket_type")?,
        ticket_number: TicketNumber(row.try_get("ticket_number")?),
        status: TicketStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown ticket status '{status}'"))?,
        transferred_from: row.try_get("transferred_from")?,
        validated_at: row.try_get("validated_at")?,
        validated_by: row.try_get("validated_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_validation(row: &PgRow) -> anyhow::Result<ValidationRecord> {
    Ok(ValidationRecord {
        id: row.try_get("id")?,
        ticket_number: row.try_get("ticket_number")?,
        outcome: row.try_get("outcome")?,
        validator: row.try_get("validator")?,
        location: row.try_get("location")?,
        notes: row.try_get("notes")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

fn row_to_outbox_message(row: &PgRow) -> anyhow::Result<OutboxMessage> {
    let status: String = row.try_get("status")?;
    Ok(OutboxMessage {
        id: row.try_get("id")?,
        recipient: row.try_get("recipient")?,
        template: row.try_get("template")?,
        payload: row.try_get("payload")?,
        status: OutboxStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown outbox status '{status}'"))?,
        attempts: row.try_get("attempts")?,
        available_at: row.try_get("available_at")?,
        delivered_at: row.try_get("delivered_at")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
    })
}

const TICKET_COLUMNS: &str = "id, order_id, owner_name, owner_email, ticket_type, \
     ticket_number, status, transferred_from, validated_at, validated_by, created_at";

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn insert_order(&self, order: &Order) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, buyer_name, buyer_email, buyer_phone, currency,
                total_amount, quantity, ticket_type, status, created_at, fulfilled_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id.0)
        .bind(&order.buyer_name)
        .bind(&order.buyer_email)
        .bind(&order.buyer_phone)
        .bind(&order.currency)
        .bind(order.total_amount)
        .bind(order.quantity as i32)
        .bind(&order.ticket_type)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.fulfilled_at)
        .execute(&self.pool)
        .await
        .context("inserting order")?;
        Ok(())
    }

    async fn find_order(&self, id: OrderId) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .context("loading order")?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn transition_order(
        &self,
        id: OrderId,
        from: &[OrderStatus],
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> anyhow::Result<TransitionOutcome> {
        let from_statuses = status_strings(from, OrderStatus::as_str);
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2,
                fulfilled_at = CASE WHEN $2 = 'fulfilled' THEN $3 ELSE fulfilled_at END
            WHERE id = $1 AND status = ANY($4)
            "#,
        )
        .bind(id.0)
        .bind(to.as_str())
        .bind(at)
        .bind(&from_statuses)
        .execute(&self.pool)
        .await
        .context("transitioning order")?;
        if result.rows_affected() == 1 {
            return Ok(TransitionOutcome::Applied);
        }
        let current: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .context("reading order status")?;
        Ok(match current {
            Some(status) if status == to.as_str() => TransitionOutcome::AlreadyApplied,
            _ => TransitionOutcome::Rejected,
        })
    }

    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("pinging postgres")?;
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for PostgresStore {
    async fn insert_payment(&self, payment: &Payment) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, provider, provider_reference, amount, currency,
                status, flagged_for_review, raw_event, created_at, verified_at, refunded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(payment.id.0)
        .bind(payment.order_id.0)
        .bind(payment.provider.as_str())
        .bind(payment.provider_reference.as_str())
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(payment.flagged_for_review)
        .bind(&payment.raw_event)
        .bind(payment.created_at)
        .bind(payment.verified_at)
        .bind(payment.refunded_at)
        .execute(&self.pool)
        .await
        .context("inserting payment")?;
        Ok(())
    }

    async fn find_payment(&self, id: PaymentId) -> anyhow::Result<Option<Payment>> {
        let row = sqlx::query("SELECT * FROM payments WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .context("loading payment")?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn find_payment_by_reference(
        &self,
        provider: ProviderKind,
        reference: &ProviderReference,
    ) -> anyhow::Result<Option<Payment>> {
        let row =
            sqlx::query("SELECT * FROM payments WHERE provider = $1 AND provider_reference = $2")
                .bind(provider.as_str())
                .bind(reference.as_str())
                .fetch_optional(&self.pool)
                .await
                .context("loading payment by reference")?;
        row.as_ref().map(row_to_payment).transpose()
    }

    async fn list_payments_for_order(&self, order_id: OrderId) -> anyhow::Result<Vec<Payment>> {
        let rows = sqlx::query("SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at")
            .bind(order_id.0)
            .fetch_all(&self.pool)
            .await
            .context("listing payments")?;
        rows.iter().map(row_to_payment).collect()
    }

    async fn transition_payment(
        &self,
        id: PaymentId,
        from: &[PaymentStatus],
        to: PaymentStatus,
        raw_event: &serde_json::Value,
        at: DateTime<Utc>,
    ) -> anyhow::Result<TransitionOutcome> {
        let from_statuses = status_strings(from, PaymentStatus::as_str);
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2,
                raw_event = $3,
                verified_at = CASE WHEN $2 = 'successful' THEN $4 ELSE verified_at END,
                refunded_at = CASE WHEN $2 = 'refunded' THEN $4 ELSE refunded_at END
            WHERE id = $1 AND status = ANY($5)
            "#,
        )
        .bind(id.0)
        .bind(to.as_str())
        .bind(raw_event)
        .bind(at)
        .bind(&from_statuses)
        .execute(&self.pool)
        .await
        .context("transitioning payment")?;
        if result.rows_affected() == 1 {
            return Ok(TransitionOutcome::Applied);
        }
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM payments WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .context("reading payment status")?;
        Ok(match current {
            Some(status) if status == to.as_str() => TransitionOutcome::AlreadyApplied,
            _ => TransitionOutcome::Rejected,
        })
    }

    async fn flag_payment_for_review(&self, id: PaymentId) -> anyhow::Result<()> {
        let result = sqlx::query("UPDATE payments SET flagged_for_review = TRUE WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .context("flagging payment")?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("payment {} not found", id));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketRepository for PostgresStore {
    async fn issue_tickets(
        &self,
        order_id: OrderId,
        tickets: &[Ticket],
    ) -> anyhow::Result<IssuanceOutcome> {
        let mut tx = self.pool.begin().await.context("starting issuance")?;
        // Lock the parent order row so two replays of the same success
        // event serialize here instead of double-inserting.
        sqlx::query("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.0)
            .fetch_optional(&mut *tx)
            .await
            .context("locking order for issuance")?;
        let existing_rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE order_id = $1 ORDER BY created_at"
        ))
        .bind(order_id.0)
        .fetch_all(&mut *tx)
        .await
        .context("checking for issued tickets")?;
        if !existing_rows.is_empty() {
            tx.rollback().await.context("releasing issuance lock")?;
            let existing = existing_rows
                .iter()
                .map(row_to_ticket)
                .collect::<anyhow::Result<Vec<Ticket>>>()?;
            return Ok(IssuanceOutcome::AlreadyIssued(existing));
        }
        for ticket in tickets {
            insert_ticket_tx(&mut tx, ticket).await?;
        }
        tx.commit().await.context("committing issuance")?;
        Ok(IssuanceOutcome::Issued(tickets.to_vec()))
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tickets (
                id, order_id, owner_name, owner_email, ticket_type, ticket_number,
                status, transferred_from, validated_at, validated_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(ticket.id.0)
        .bind(ticket.order_id.0)
        .bind(&ticket.owner_name)
        .bind(&ticket.owner_email)
        .bind(&ticket.ticket_type)
        .bind(ticket.ticket_number.as_str())
        .bind(ticket.status.as_str())
        .bind(&ticket.transferred_from)
        .bind(ticket.validated_at)
        .bind(&ticket.validated_by)
        .bind(ticket.created_at)
        .execute(&self.pool)
        .await
        .context("inserting ticket")?;
        Ok(())
    }

    async fn find_ticket(&self, id: TicketId) -> anyhow::Result<Option<Ticket>> {
        let row = sqlx::query("SELECT * FROM tickets WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .context("loading ticket")?;
        row.as_ref().map(row_to_ticket).transpose()
    }

    async fn list_tickets_for_order(&self, order_id: OrderId) -> anyhow::Result<Vec<Ticket>> {
        let rows = sqlx::query("SELECT * FROM tickets WHERE order_id = $1 ORDER BY created_at")
            .bind(order_id.0)
            .fetch_all(&self.pool)
            .await
            .context("listing tickets")?;
        rows.iter().map(row_to_ticket).collect()
    }

    async fn check_in_ticket(
        &self,
        id: TicketId,
        validator: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<CheckInUpdate> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE tickets
            SET status = 'used', validated_at = $2, validated_by = $3
            WHERE id = $1 AND status = 'active'
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(id.0)
        .bind(at)
        .bind(validator)
        .fetch_optional(&self.pool)
        .await
        .context("checking in ticket")?;
        if let Some(row) = row.as_ref() {
            return Ok(CheckInUpdate::Admitted(row_to_ticket(row)?));
        }
        // Lost the conditional update; read the row to say why.
        let Some(ticket) = self.find_ticket(id).await? else {
            return Ok(CheckInUpdate::NotFound);
        };
        match ticket.status {
            TicketStatus::Used => Ok(CheckInUpdate::AlreadyUsed {
                validated_at: ticket.validated_at.unwrap_or(at),
                validated_by: ticket.validated_by,
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
        // The RHS owner_email reads the pre-update row, so the previous
        // holder lands in transferred_from.
        let row = sqlx::query(&format!(
            r#"
            UPDATE tickets
            SET owner_name = $2, owner_email = $3, transferred_from = owner_email
            WHERE id = $1 AND status = 'active' AND validated_at IS NULL
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(id.0)
        .bind(to_name)
        .bind(to_email)
        .fetch_optional(&self.pool)
        .await
        .context("transferring ticket")?;
        if let Some(row) = row.as_ref() {
            return Ok(TransferUpdate::Applied(row_to_ticket(row)?));
        }
        let Some(ticket) = self.find_ticket(id).await? else {
            return Ok(TransferUpdate::NotFound);
        };
        Ok(TransferUpdate::Ineligible {
            status: ticket.status,
        })
    }

    async fn transition_ticket(
        &self,
        id: TicketId,
        from: &[TicketStatus],
        to: TicketStatus,
    ) -> anyhow::Result<TransitionOutcome> {
        let from_statuses = status_strings(from, TicketStatus::as_str);
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = $2
            WHERE id = $1 AND status = ANY($3) AND validated_at IS NULL
            "#,
        )
        .bind(id.0)
        .bind(to.as_str())
        .bind(&from_statuses)
        .execute(&self.pool)
        .await
        .context("transitioning ticket")?;
        if result.rows_affected() == 1 {
            return Ok(TransitionOutcome::Applied);
        }
        let current: Option<String> = sqlx::query_scalar("SELECT status FROM tickets WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .context("reading ticket status")?;
        Ok(match current {
            Some(status) if status == to.as_str() => TransitionOutcome::AlreadyApplied,
            _ => TransitionOutcome::Rejected,
        })
    }

    async fn refund_active_tickets(&self, order_id: OrderId) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE tickets SET status = 'refunded' WHERE order_id = $1 AND status = 'active'",
        )
        .bind(order_id.0)
        .execute(&self.pool)
        .await
        .context("refunding tickets")?;
        Ok(result.rows_affected())
    }
}

async fn insert_ticket_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ticket: &Ticket,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tickets (
            id, order_id, owner_name, owner_email, ticket_type, ticket_number,
            status, transferred_from, validated_at, validated_by, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(ticket.id.0)
    .bind(ticket.order_id.0)
    .bind(&ticket.owner_name)
    .bind(&ticket.owner_email)
    .bind(&ticket.ticket_type)
    .bind(ticket.ticket_number.as_str())
    .bind(ticket.status.as_str())
    .bind(&ticket.transferred_from)
    .bind(ticket.validated_at)
    .bind(&ticket.validated_by)
    .bind(ticket.created_at)
    .execute(&mut **tx)
    .await
    .context("inserting issued ticket")?;
    Ok(())
}

#[async_trait]
impl ValidationRepository for PostgresStore {
    async fn append_validation(&self, record: &ValidationRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO validation_records (
                id, ticket_number, outcome, validator, location, notes, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(&record.ticket_number)
        .bind(&record.outcome)
        .bind(&record.validator)
        .bind(&record.location)
        .bind(&record.notes)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .context("appending validation record")?;
        Ok(())
    }

    async fn list_validations(&self, limit: usize) -> anyhow::Result<Vec<ValidationRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM validation_records ORDER BY recorded_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("listing validation records")?;
        rows.iter().map(row_to_validation).collect()
    }
}

#[async_trait]
impl OutboxRepository for PostgresStore {
    async fn enqueue(&self, message: &OutboxMessage) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_messages (
                id, recipient, template, payload, status, attempts,
                available_at, delivered_at, last_error, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(message.id)
        .bind(&message.recipient)
        .bind(&message.template)
        .bind(&message.payload)
        .bind(message.status.as_str())
        .bind(message.attempts)
        .bind(message.available_at)
        .bind(message.delivered_at)
        .bind(&message.last_error)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .context("enqueueing outbox message")?;
        Ok(())
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM outbox_messages
            WHERE status = 'pending' AND available_at <= $1
            ORDER BY available_at
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("fetching due outbox messages")?;
        rows.iter().map(row_to_outbox_message).collect()
    }

    async fn mark_delivered(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE outbox_messages SET status = 'delivered', delivered_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .context("marking outbox message delivered")?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("outbox message {} not found", id));
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        let result = match retry_at {
            Some(at) => {
                sqlx::query(
                    r#"
                    UPDATE outbox_messages
                    SET attempts = attempts + 1, last_error = $2, available_at = $3
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(error)
                .bind(at)
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE outbox_messages
                    SET attempts = attempts + 1, last_error = $2, status = 'failed'
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(error)
                .execute(&self.pool)
                .await
            }
        }
        .context("marking outbox message failed")?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("outbox message {} not found", id));
        }
        Ok(())
    }
}
