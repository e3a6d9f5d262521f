//! Common error types for CQP

use thiserror::Error;

/// Common result type for CQP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure errors shared by the portal services.
///
/// User-facing failure kinds live in the service crate's action error
/// taxonomy; this enum only covers storage, I/O and configuration.
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
}
