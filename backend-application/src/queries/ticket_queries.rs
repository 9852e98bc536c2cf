// Ticket lookups

use chrono::Utc;

use backend_domain::{TicketId, TicketStatus, TicketWithQr};

use crate::{AppError, AppState};

/// A single ticket, with a freshly derived QR payload while it is still
/// admissible.
pub async fn get_ticket(state: &AppState, id: TicketId) -> Result<TicketWithQr, AppError> {
    let Some(ticket) = state.ticket_repo.find_ticket(id).await? else {
        return Err(AppError::NotFound(format!("ticket {}", id)));
    };
    let qr_payload =
        (ticket.status == TicketStatus::Active).then(|| state.qr_codec.encode(&ticket, Utc::now()));
    Ok(TicketWithQr { ticket, qr_payload })
}
