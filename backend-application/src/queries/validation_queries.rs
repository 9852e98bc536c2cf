// Validation log lookups

use backend_domain::{ValidationLogQuery, ValidationRecord};

use crate::{AppError, AppState};

const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 500;

/// Recent gate activity, most recent first.
pub async fn list_checkin_log(
    state: &AppState,
    query: ValidationLogQuery,
) -> Result<Vec<ValidationRecord>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .clamp(1, MAX_LOG_LIMIT);
    Ok(state.validation_repo.list_validations(limit).await?)
}
