use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("integrity failure: {0}")]
    Integrity(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
