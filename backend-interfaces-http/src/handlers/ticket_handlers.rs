use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use backend_application::commands::ticket_commands;
use backend_application::queries::ticket_queries;
use backend_application::AppState;
use backend_domain::{Ticket, TicketId, TicketWithQr, TransferRequest};

use crate::error::HttpError;
use crate::middleware::authorize;

pub async fn get_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketWithQr>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let ticket = ticket_queries::get_ticket(&state, TicketId(id)).await?;
    Ok(Json(ticket))
}

pub async fn transfer_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransferRequest>,
) -> Result<Json<TicketWithQr>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let ticket = ticket_commands::transfer_ticket(&state, TicketId(id), payload).await?;
    Ok(Json(ticket))
}

pub async fn assign_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransferRequest>,
) -> Result<Json<TicketWithQr>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let ticket = ticket_commands::assign_ticket(&state, TicketId(id), payload).await?;
    Ok(Json(ticket))
}

pub async fn regenerate_qr(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketWithQr>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let ticket = ticket_commands::regenerate_qr(&state, TicketId(id)).await?;
    Ok(Json(ticket))
}

pub async fn cancel_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let ticket = ticket_commands::cancel_ticket(&state, TicketId(id)).await?;
    Ok(Json(ticket))
}
