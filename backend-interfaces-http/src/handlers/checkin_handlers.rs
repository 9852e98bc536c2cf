use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;

use backend_application::commands::checkin_commands;
use backend_application::queries::validation_queries;
use backend_application::AppState;
use backend_domain::{CheckInOutcome, CheckInRequest, ValidationLogQuery, ValidationRecord};

use crate::error::HttpError;
use crate::middleware::authorize;

/// Gate scan. Admits and denies are both 200 responses; the gate UI
/// branches on the `outcome` field. Everything else is an error.
pub async fn check_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckInRequest>,
) -> Result<Json<CheckInOutcome>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let outcome = checkin_commands::check_in(&state, payload).await?;
    Ok(Json(outcome))
}

pub async fn list_checkin_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ValidationLogQuery>,
) -> Result<Json<Vec<ValidationRecord>>, HttpError> {
    if !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let records = validation_queries::list_checkin_log(&state, query).await?;
    Ok(Json(records))
}
