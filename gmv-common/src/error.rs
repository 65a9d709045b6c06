//! Common error types for GMV

use thiserror::Error;

/// Common result type for GMV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across GMV crates
///
/// The page only distinguishes a network failure (retry may help) and a
/// validation failure (fix the input) from everything else.
#[derive(Error, Debug)]
pub enum Error {
    /// Remote API unreachable, timed out, or answered with a non-success status
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid user input or request parameter
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local state database error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
