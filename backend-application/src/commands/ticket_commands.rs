// Ticket issuance, transfer, assignment, and cancellation

use chrono::Utc;
use tracing::{debug, info, warn};

use backend_domain::ports::{IssuanceOutcome, TransferUpdate, TransitionOutcome};
use backend_domain::{
    Order, OutboxMessage, Ticket, TicketId, TicketStatus, TicketWithQr, TransferRequest,
};

use crate::{AppError, AppState};

/// Mints the order's tickets, exactly once per order. Replays hit the
/// store-level guard and get the existing batch back, so this is safe
/// to call from every duplicate webhook delivery.
pub async fn issue_for_order(state: &AppState, order: &Order) -> Result<IssuanceOutcome, AppError> {
    let fresh: Vec<Ticket> = (0..order.quantity).map(|_| Ticket::issue(order)).collect();
    let outcome = state.ticket_repo.issue_tickets(order.id, &fresh).await?;

    match &outcome {
        IssuanceOutcome::Issued(tickets) => {
            info!("issued {} tickets for order {}", tickets.len(), order.id);
            state.metrics.record_tickets_issued(tickets.len());
            for ticket in tickets {
                enqueue_ticket_notification(state, ticket, "ticket-issued").await;
            }
        }
        IssuanceOutcome::AlreadyIssued(tickets) => {
            debug!("order {} already holds {} tickets", order.id, tickets.len());
        }
    }

    Ok(outcome)
}

/// Holder change in place: same ticket, same number, new name on the
/// door. The previous holder's QR payloads die with the owner hash.
pub async fn transfer_ticket(
    state: &AppState,
    ticket_id: TicketId,
    request: TransferRequest,
) -> Result<TicketWithQr, AppError> {
    let (to_name, to_email) = normalize_holder(&request)?;

    match state
        .ticket_repo
        .transfer_ticket(ticket_id, &to_name, &to_email)
        .await?
    {
        TransferUpdate::Applied(ticket) => {
            info!(
                "ticket {} transferred to {}",
                ticket.ticket_number, to_email
            );
            state.metrics.record_ticket_transfer();
            enqueue_ticket_notification(state, &ticket, "ticket-transferred").await;
            let qr_payload = state.qr_codec.encode(&ticket, Utc::now());
            Ok(TicketWithQr {
                ticket,
                qr_payload: Some(qr_payload),
            })
        }
        TransferUpdate::Ineligible { status } => Err(AppError::InvalidState(format!(
            "ticket is {} and cannot be transferred",
            status.as_str()
        ))),
        TransferUpdate::NotFound => Err(AppError::NotFound(format!("ticket {}", ticket_id))),
    }
}

/// Organizer assignment: the original ticket is retired and a fresh one
/// is minted for the attendee, so the bulk buyer keeps a clean paper
/// trail of which credential went to whom.
pub async fn assign_ticket(
    state: &AppState,
    ticket_id: TicketId,
    request: TransferRequest,
) -> Result<TicketWithQr, AppError> {
    let (to_name, to_email) = normalize_holder(&request)?;

    let Some(retired) = state.ticket_repo.find_ticket(ticket_id).await? else {
        return Err(AppError::NotFound(format!("ticket {}", ticket_id)));
    };

    match state
        .ticket_repo
        .transition_ticket(ticket_id, &[TicketStatus::Active], TicketStatus::TransferredOut)
        .await?
    {
        TransitionOutcome::Applied => {}
        TransitionOutcome::AlreadyApplied | TransitionOutcome::Rejected => {
            return Err(AppError::InvalidState(format!(
                "ticket is {} and cannot be reassigned",
                retired.status.as_str()
            )));
        }
    }

    let replacement = Ticket::reissue(&retired, &to_name, &to_email);
    state.ticket_repo.insert_ticket(&replacement).await?;
    info!(
        "ticket {} retired; reissued as {} for {}",
        retired.ticket_number, replacement.ticket_number, to_email
    );
    state.metrics.record_ticket_transfer();
    enqueue_ticket_notification(state, &replacement, "ticket-assigned").await;

    let qr_payload = state.qr_codec.encode(&replacement, Utc::now());
    Ok(TicketWithQr {
        ticket: replacement,
        qr_payload: Some(qr_payload),
    })
}

/// Fresh QR payload for an active ticket, e.g. after the previous image
/// aged past the freshness window.
pub async fn regenerate_qr(state: &AppState, ticket_id: TicketId) -> Result<TicketWithQr, AppError> {
    let Some(ticket) = state.ticket_repo.find_ticket(ticket_id).await? else {
        return Err(AppError::NotFound(format!("ticket {}", ticket_id)));
    };
    if ticket.status != TicketStatus::Active {
        return Err(AppError::InvalidState(format!(
            "ticket is {} and has no admissible payload",
            ticket.status.as_str()
        )));
    }

    let qr_payload = state.qr_codec.encode(&ticket, Utc::now());
    Ok(TicketWithQr {
        ticket,
        qr_payload: Some(qr_payload),
    })
}

/// Voids a single active ticket, e.g. a revoked comp. Used tickets are
/// history and stay untouched.
pub async fn cancel_ticket(state: &AppState, ticket_id: TicketId) -> Result<Ticket, AppError> {
    let Some(ticket) = state.ticket_repo.find_ticket(ticket_id).await? else {
        return Err(AppError::NotFound(format!("ticket {}", ticket_id)));
    };

    match state
        .ticket_repo
        .transition_ticket(ticket_id, &[TicketStatus::Active], TicketStatus::Cancelled)
        .await?
    {
        TransitionOutcome::Applied => {
            info!("ticket {} cancelled", ticket.ticket_number);
        }
        TransitionOutcome::AlreadyApplied => {}
        TransitionOutcome::Rejected => {
            return Err(AppError::InvalidState(format!(
                "ticket is {} and cannot be cancelled",
                ticket.status.as_str()
            )));
        }
    }

    Ok(state
        .ticket_repo
        .find_ticket(ticket_id)
        .await?
        .unwrap_or(ticket))
}

async fn enqueue_ticket_notification(state: &AppState, ticket: &Ticket, template: &str) {
    let payload = serde_json::json!({
        "ticket_number": ticket.ticket_number.as_str(),
        "ticket_type": ticket.ticket_type,
        "owner_name": ticket.owner_name,
        "qr_payload": state.qr_codec.encode(ticket, Utc::now()),
    });
    let message = OutboxMessage::new(&ticket.owner_email, template, payload);
    // Delivery is best-effort by design; the credential is already
    // persisted and retrievable through the API.
    if let Err(err) = state.outbox_repo.enqueue(&message).await {
        warn!("failed to enqueue {} notification: {}", template, err);
    }
}

fn normalize_holder(request: &TransferRequest) -> Result<(String, String), AppError> {
    let name = request.to_name.trim();
    let email = request.to_email.trim().to_lowercase();
    if name.is_empty() {
        return Err(AppError::BadRequest("to_name must not be empty".to_string()));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest(
            "to_email must be a valid address".to_string(),
        ));
    }
    Ok((name.to_string(), email))
}
