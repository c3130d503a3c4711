use thiserror::Error;

/// Common result type for core operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("email not verified")]
    EmailNotVerified,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("token is invalid")]
    InvalidToken,
    #[error("expired: {0}")]
    Expired(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("policy violation: {0}")]
    PolicyViolation(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("other error: {0}")]
    Other(String),
}
