//! Error types for strokecast

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for strokecast
#[derive(Debug, Error)]
pub enum StrokecastError {
    #[error("Package error: {0}")]
    Package(#[from] PackageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// A package that fails validation
///
/// Malformed packages are rejected before they reach the wire and are
/// never placed in a retry ledger.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PackageError {
    #[error("Package is missing its stroke id")]
    MissingStrokeId,

    #[error("Invalid package sequence number: {0} (sequence numbers start at 1)")]
    InvalidSequence(u32),

    #[error("Package sequence number {sequence} exceeds the limit of {max}")]
    SequenceTooLarge { sequence: u32, max: u32 },

    #[error("Point {index} has a non-finite coordinate")]
    NonFinitePoint { index: usize },

    #[error("Stroke sequence number set on non-terminal package {0}")]
    StrokeSequenceOnNonTerminal(u32),
}

/// Errors related to transport
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Acknowledgement not received within {0:?}")]
    AckTimeout(Duration),

    #[error("Package rejected by peer: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Whether resending the same package could succeed
    ///
    /// Connection establishment failures (refused handshake, CORS or auth
    /// rejection) are surfaced immediately instead of being retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::ConnectionFailed(_))
    }
}

/// Errors related to wire protocol handling
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Message encoding failed: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            ProtocolError::InvalidMessageFormat(e.to_string())
        } else {
            ProtocolError::Encoding(e.to_string())
        }
    }
}

/// Result type alias for strokecast operations
pub type StrokecastResult<T> = Result<T, StrokecastError>;
