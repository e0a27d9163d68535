//! # Strokecast Relay
//!
//! Session-scoped relay for stroke packages. Every package a participant
//! sends is acknowledged to the sender and forwarded unmodified to every
//! other participant in the same session. The relay keeps a per-session
//! [`GapDetector`](strokecast_core::GapDetector) purely for observation: it
//! logs completed strokes and gaps but never reorders, buffers or retries.
//!
//! ## Components
//!
//! - [`Relay`]: Session registry, fan-out and acknowledgement
//! - [`RelayConnection`]: In-process [`AckTransport`](strokecast_core::AckTransport)
//!   joined to a relay session
//! - [`router`]: axum router serving `/ws` and `/health`
//! - [`MaintenanceTask`]: Periodic eviction of stale strokes and sessions
//! - [`RelayConfig`]: TOML configuration

pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod maintenance;
pub mod server;

pub use config::{LoggingSection, RelayConfig, RetentionConfig};
pub use connection::RelayConnection;
pub use error::{ConfigError, RelayError, RelayResult};
pub use hub::{DEFAULT_SESSION, HubConfig, MaintenanceReport, ParticipantId, Relay, RelayStats};
pub use maintenance::MaintenanceTask;
pub use server::{AppState, HealthResponse, router};
