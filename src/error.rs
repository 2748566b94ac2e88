use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    /// Malformed input: missing fields, bad percentages, duplicate ids.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Caller is not permitted to perform the operation.
    #[error("Authorization error: {0}")]
    Authorization(String),
    /// Input was well-formed but the operation violates a workflow rule.
    #[error("Business rule violation: {0}")]
    BusinessRule(String),
    /// Unique-constraint collision at the store. Retry the whole operation.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Referenced entity does not exist (or is soft-deleted).
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, PaymentError>;
