//! # Strokecast Core
//!
//! Core types, wire messages and shared components for real-time stroke
//! streaming.
//!
//! A stroke (one pointer-down-to-up gesture) is split by the sender into
//! bounded [`Package`]s, relayed to every other participant, and tracked on
//! the receiving side by a [`GapDetector`] that knows which packages have
//! arrived and whether the stroke is complete.
//!
//! ## Key Types
//!
//! - [`Point`]: A timestamped pointer sample
//! - [`Package`]: A validated batch of points with its sequence number
//! - [`StrokeId`]: Globally unique stroke identifier
//! - [`ClientMessage`] / [`ServerMessage`]: JSON wire envelopes
//! - [`GapDetector`]: Per-stroke gap and completeness tracking
//!
//! ## Key Traits
//!
//! - [`AckTransport`]: Acknowledged package delivery

pub mod error;
pub mod gap;
pub mod mock_transport;
pub mod package;
pub mod point;
pub mod transport;
pub mod wire;

// Re-export main types
pub use error::*;
pub use gap::{CompletionResult, EvictionReason, GapDetector, GapDetectorConfig};
pub use mock_transport::{MockAckTransport, MockOutcome};
pub use package::{MAX_PACKAGE_SEQUENCE, Package, PackageKey, StrokeId};
pub use point::Point;
pub use transport::AckTransport;
pub use wire::{
    Ack, AckStatus, ClientMessage, DRAWING_PACKET_EVENT, RECEIVED_DATA_EVENT, ServerMessage,
};
