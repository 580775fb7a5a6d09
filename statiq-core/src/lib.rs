//! Statiq Core Library
//!
//! This crate provides the pieces shared by every other Statiq crate: the
//! immutable server configuration, the credential store and the error type.

pub mod config;
pub mod error;

pub use config::{CompressionLevel, ConfigWarning, Credentials, Options, ServerConfig};
pub use error::{Error, Result};

/// Statiq version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
