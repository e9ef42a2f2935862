//! Runtime error types.

use thiserror::Error;

use rubot_core::{ApiError, TransportError, UsageError};

use crate::config::ConfigError;

/// Errors surfaced by [`Rubot`](crate::Rubot) construction and lifecycle calls.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    /// The OS signal handler could not be installed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
