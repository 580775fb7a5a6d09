//! Error types for Statiq

use thiserror::Error;

/// Result type for Statiq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Statiq
#[derive(Error, Debug)]
pub enum Error {
    /// Server error
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
