//! Client-side error types

use strokecast_core::{PackageError, PackageKey, TransportError};
use thiserror::Error;

/// Errors that end a package send
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The package failed validation and was never transmitted
    #[error("Malformed package: {0}")]
    Malformed(#[from] PackageError),

    /// The same package is already awaiting acknowledgement
    #[error("Package {0} is already in flight")]
    AlreadyInFlight(PackageKey),

    /// Every attempt failed; the package is dropped
    #[error("Package {key} dropped after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        key: PackageKey,
        attempts: u32,
        last_error: TransportError,
    },

    /// The connection could not be established; not retried
    #[error("Connection failed while sending package {key}: {error}")]
    Connection {
        key: PackageKey,
        error: TransportError,
    },
}

impl SendError {
    /// The package this error concerns, if it was well-formed
    pub fn key(&self) -> Option<&PackageKey> {
        match self {
            SendError::Malformed(_) => None,
            SendError::AlreadyInFlight(key) => Some(key),
            SendError::RetriesExhausted { key, .. } => Some(key),
            SendError::Connection { key, .. } => Some(key),
        }
    }
}

/// Errors from the stroke streamer handle
#[derive(Debug, Error)]
pub enum StreamerError {
    /// The streamer task is no longer accepting events
    #[error("Streamer has stopped")]
    Stopped,

    /// The streamer task panicked or was cancelled
    #[error("Streamer task failed: {0}")]
    Task(String),
}

/// Result type for send operations
pub type SendResult<T> = Result<T, SendError>;
