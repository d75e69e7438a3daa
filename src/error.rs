use thiserror::Error;

use crate::models::RequestStatus;

/// Failures surfaced by the limit store, the workflow and administration.
///
/// None of these are transient; callers report them rather than retry.
#[derive(Debug, Error)]
pub(crate) enum LimitError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{actor} is not allowed to {action}")]
    Authorization { actor: String, action: &'static str },

    #[error("Increase request {id} is already {status}")]
    InvalidState { id: i64, status: RequestStatus },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub(crate) type LimitResult<T> = std::result::Result<T, LimitError>;

pub(crate) fn duplicate_po(po_name: &str) -> LimitError {
    LimitError::Validation(format!("purchase order {po_name} was already submitted"))
}
