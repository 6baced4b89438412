//! Common error types for YaMDb

use thiserror::Error;

use crate::validation::FieldErrors;

/// Common result type for YaMDb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the YaMDb crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Field-level validation failure
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Access token could not be issued or verified
    #[error("Token error: {0}")]
    Token(String),

    /// Mail backend failed to deliver a message
    #[error("Mail error: {0}")]
    Mail(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a validation error on a single field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Error::Validation(errors)
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::Token(err.to_string())
    }
}

/// True when the database rejected a write because of a UNIQUE constraint
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}
