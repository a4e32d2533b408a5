//! # Application Errors
//!
//! Errors surfaced by the binary: registry failures, bad configuration and
//! I/O around the database file or the listening socket.

use ringling_core::RegistryError;
use thiserror::Error;

/// Top-level error of the Ringling binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// A registry operation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The configuration file or an override is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading a file or binding a socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
