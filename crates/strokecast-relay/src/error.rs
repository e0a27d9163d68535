//! Relay error types

use std::path::PathBuf;

use strokecast_core::ProtocolError;
use thiserror::Error;

use crate::hub::ParticipantId;

/// Errors raised while relaying packages
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Participant {participant} has not joined session {session}")]
    NotJoined {
        session: String,
        participant: ParticipantId,
    },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("WebSocket error: {0}")]
    Socket(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors loading the relay configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;
