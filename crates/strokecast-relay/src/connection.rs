//! In-process connection to a relay
//!
//! [`RelayConnection`] joins a session directly on a shared [`Relay`] and
//! implements [`AckTransport`], so a client sender can run against the
//! relay without a socket in between. Forwarded packages arrive on the
//! receiver returned by [`RelayConnection::connect`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use strokecast_core::{Ack, AckTransport, Package, ServerMessage, TransportError};

use crate::error::RelayError;
use crate::hub::{ParticipantId, Relay};

/// A participant's handle on a relay session
pub struct RelayConnection {
    relay: Arc<Relay>,
    session: String,
    participant: ParticipantId,
    open: AtomicBool,
}

impl RelayConnection {
    /// Join `session` and return the connection plus its inbound messages
    pub fn connect(
        relay: Arc<Relay>,
        session: impl Into<String>,
    ) -> (Self, mpsc::Receiver<ServerMessage>) {
        let session = session.into();
        let (participant, inbox) = relay.join(&session);
        let connection = Self {
            relay,
            session,
            participant,
            open: AtomicBool::new(true),
        };
        (connection, inbox)
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Leave the session; later emits fail with `ConnectionClosed`
    pub fn disconnect(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.relay.leave(&self.session, self.participant);
            debug!(session = %self.session, participant = self.participant, "Connection closed");
        }
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[async_trait]
impl AckTransport for RelayConnection {
    async fn emit(&self, package: &Package) -> Result<Ack, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::ConnectionClosed);
        }
        self.relay
            .forward(&self.session, self.participant, package.clone())
            .map_err(|e| match e {
                RelayError::UnknownSession(_) | RelayError::NotJoined { .. } => {
                    TransportError::ConnectionClosed
                }
                other => TransportError::SendFailed(other.to_string()),
            })
    }

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
