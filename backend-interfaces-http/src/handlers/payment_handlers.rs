use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use backend_application::commands::{payment_commands, webhook_commands};
use backend_application::queries::order_queries;
use backend_application::AppState;
use backend_domain::{
    CheckoutReceipt, CheckoutRequest, Order, OrderDetails, OrderId, WebhookRequest,
};

use crate::error::HttpError;
use crate::middleware::authorize;

#[derive(serde::Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

pub async fn initialize_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutReceipt>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let receipt = payment_commands::initialize_payment(&state, payload).await?;
    Ok(Json(receipt))
}

/// Provider callbacks. There is no bearer guard here on purpose: the
/// provider signs the raw body and that signature is the credential.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Json<WebhookAck>, HttpError> {
    let request = WebhookRequest::new(header_pairs(&headers), body.to_vec());
    let outcome = webhook_commands::ingest_webhook(&state, request).await?;
    Ok(Json(WebhookAck {
        status: outcome.as_str(),
    }))
}

pub async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetails>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let details = order_queries::get_order(&state, OrderId(id)).await?;
    Ok(Json(details))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let order = payment_commands::cancel_order(&state, OrderId(id)).await?;
    Ok(Json(order))
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
