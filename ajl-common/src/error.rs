//! Common error types for the access journey toolkit

use thiserror::Error;

/// Common result type for toolkit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and the web service
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

    /// Caller may not modify this resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored row could not be turned into a typed record
    #[error("Malformed row in {table}: {message}")]
    MalformedRow { table: &'static str, message: String },

    /// Object storage upload/read/delete failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote phase endpoint failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn malformed(table: &'static str, message: impl Into<String>) -> Self {
        Error::MalformedRow {
            table,
            message: message.into(),
        }
    }
}
