//! Error types for command handlers.

use std::error::Error;

/// Error type for command handler operations.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A required parameter is absent.
    #[error("{0} missing")]
    MissingField(String),

    /// A parameter is present with the wrong JSON type.
    #[error("incorrect data type for {field}, should be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    /// Parameters could not be decoded into the handler's input type.
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// Business logic rejected the command (validation, invariant violation).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Any other failure (storage, downstream service, ...).
    #[error("handler error: {0}")]
    Other(#[source] Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap an arbitrary error.
    pub fn other(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        HandlerError::Other(err.into())
    }

    pub(crate) fn wrong_type(field: &str, expected: &'static str) -> Self {
        HandlerError::WrongType {
            field: field.to_string(),
            expected,
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}
