//! Transport abstraction for acknowledged package delivery
//!
//! The [`AckTransport`] trait is the "send with acknowledgement" primitive
//! the client sender is built on. One call transmits one package and
//! resolves once the relay acknowledges it (or the transport fails).
//! Timeouts and retries are the caller's business, so the same sender
//! logic works over a socket, an in-process relay handle, or a mock.
//!
//! ## Implementations
//!
//! - [`MockAckTransport`](crate::MockAckTransport): scripted transport for testing
//! - `RelayConnection`: in-process handle to a relay hub (in strokecast-relay)

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::package::Package;
use crate::wire::Ack;

/// Acknowledged, asynchronous package channel
///
/// # Example
///
/// ```rust,ignore
/// use strokecast_core::{AckTransport, Package};
///
/// async fn deliver<T: AckTransport>(transport: &T, package: &Package) -> bool {
///     matches!(transport.emit(package).await, Ok(ack) if ack.is_received())
/// }
/// ```
#[async_trait]
pub trait AckTransport: Send + Sync {
    /// Transmit a package and wait for its acknowledgement
    ///
    /// May never resolve if the acknowledgement is lost; callers bound the
    /// wait with a timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the package could not be handed to the network
    /// or the connection could not be established.
    async fn emit(&self, package: &Package) -> Result<Ack, TransportError>;

    /// Whether the underlying connection is currently up
    fn is_connected(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: AckTransport + ?Sized> AckTransport for Arc<T> {
    async fn emit(&self, package: &Package) -> Result<Ack, TransportError> {
        (**self).emit(package).await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
