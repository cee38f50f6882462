pub mod events;
pub mod identity;
pub mod repository;
pub mod retry;

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Seats unavailable: {seat_ids:?}")]
    SeatUnavailable { seat_ids: Vec<Uuid> },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Hold expired: {0}")]
    HoldExpired(String),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    /// Transient storage failures; only these are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Unavailable(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
