use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("malformed {what}: {message}")]
    Malformed { what: &'static str, message: String },
}
