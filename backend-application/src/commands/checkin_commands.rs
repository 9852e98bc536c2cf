// Gate check-in

use chrono::Utc;
use tracing::{info, warn};

use backend_domain::ports::CheckInUpdate;
use backend_domain::services::{owner_hash, QrError};
use backend_domain::{
    AttendeeInfo, CheckInOutcome, CheckInRequest, DenyReason, TicketStatus, ValidationRecord,
    OUTCOME_ADMITTED,
};

use crate::{AppError, AppState};

/// Decides a gate scan. Two layers: the payload must be genuine and
/// fresh, and the persisted ticket status is always the last word, so a
/// perfectly valid image of an already-consumed ticket still bounces.
pub async fn check_in(
    state: &AppState,
    request: CheckInRequest,
) -> Result<CheckInOutcome, AppError> {
    if request.validator.trim().is_empty() {
        return Err(AppError::BadRequest(
            "validator must not be empty".to_string(),
        ));
    }

    let claims = match state.qr_codec.decode(&request.qr_payload, Utc::now()) {
        Ok(claims) => claims,
        Err(QrError::Expired) => {
            // A stale image of a genuine payload; the holder refreshes
            // and scans again.
            state.metrics.record_checkin_denied();
            return Ok(CheckInOutcome::Deny {
                reason: DenyReason::PayloadExpired,
            });
        }
        Err(err) => {
            // Forged or corrupted payload. Security event, not a deny
            // the gate UI reasons about.
            warn!(
                "qr integrity failure at {} by {}: {}",
                request.location, request.validator, err
            );
            state.metrics.record_integrity_failure();
            return Err(AppError::Integrity(err.to_string()));
        }
    };

    let Some(ticket) = state.ticket_repo.find_ticket(claims.ticket_id).await? else {
        return deny(
            state,
            &request,
            claims.ticket_number.as_str(),
            DenyReason::NotFound,
        )
        .await;
    };

    // The payload binds the holder at derivation time. Once the ticket
    // has moved on, the old holder's image no longer admits anyone.
    if ticket.status == TicketStatus::Active && owner_hash(&ticket.owner_email) != claims.owner_hash
    {
        return deny(
            state,
            &request,
            ticket.ticket_number.as_str(),
            DenyReason::TransferredAway {
                current_holder: Some(ticket.owner_name.clone()),
            },
        )
        .await;
    }

    let now = Utc::now();
    match state
        .ticket_repo
        .check_in_ticket(claims.ticket_id, request.validator.trim(), now)
        .await?
    {
        CheckInUpdate::Admitted(ticket) => {
            info!(
                "ticket {} admitted at {} by {}",
                ticket.ticket_number, request.location, request.validator
            );
            state.metrics.record_checkin_admitted();
            record_attempt(state, ticket.ticket_number.as_str(), OUTCOME_ADMITTED, &request).await;
            Ok(CheckInOutcome::Admit {
                attendee: AttendeeInfo {
                    owner_name: ticket.owner_name.clone(),
                    ticket_type: ticket.ticket_type.clone(),
                    ticket_number: ticket.ticket_number.as_str().to_string(),
                },
                validated_at: ticket.validated_at.unwrap_or(now),
            })
        }
        CheckInUpdate::AlreadyUsed {
            validated_at,
            validated_by,
        } => {
            deny(
                state,
                &request,
                ticket.ticket_number.as_str(),
                DenyReason::AlreadyUsed {
                    validated_at,
                    validated_by,
                },
            )
            .await
        }
        CheckInUpdate::NotActive { status } => {
            // `Active` and `Used` never land here; the store reports
            // them as admitted or already-used.
            let reason = match status {
                TicketStatus::Cancelled => DenyReason::Cancelled,
                TicketStatus::Refunded => DenyReason::Refunded,
                _ => DenyReason::TransferredAway {
                    current_holder: None,
                },
            };
            deny(state, &request, ticket.ticket_number.as_str(), reason).await
        }
        CheckInUpdate::NotFound => {
            deny(
                state,
                &request,
                claims.ticket_number.as_str(),
                DenyReason::NotFound,
            )
            .await
        }
    }
}

async fn deny(
    state: &AppState,
    request: &CheckInRequest,
    ticket_number: &str,
    reason: DenyReason,
) -> Result<CheckInOutcome, AppError> {
    info!(
        "ticket {} denied ({}) at {} by {}",
        ticket_number,
        reason.as_str(),
        request.location,
        request.validator
    );
    state.metrics.record_checkin_denied();
    let outcome = format!("denied:{}", reason.as_str());
    record_attempt(state, ticket_number, &outcome, request).await;
    Ok(CheckInOutcome::Deny { reason })
}

/// Append to the validation log. The gate decision has already been
/// made; a write failure here is logged, never surfaced.
async fn record_attempt(
    state: &AppState,
    ticket_number: &str,
    outcome: &str,
    request: &CheckInRequest,
) {
    let record = ValidationRecord::new(
        ticket_number,
        outcome,
        request.validator.trim(),
        &request.location,
        request.notes.as_deref(),
    );
    if let Err(err) = state.validation_repo.append_validation(&record).await {
        warn!("failed to append validation record: {}", err);
    }
}
