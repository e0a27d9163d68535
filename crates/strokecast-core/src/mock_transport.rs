//! Scripted transport for testing
//!
//! [`MockAckTransport`] plays back a script of per-attempt outcomes and
//! records every package handed to it, so sender retry behavior can be
//! exercised without a relay.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use strokecast_core::{MockAckTransport, MockOutcome};
//!
//! // First attempt times out, second is acknowledged
//! let transport = MockAckTransport::new()
//!     .with_script([MockOutcome::Timeout, MockOutcome::Ack]);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::TransportError;
use crate::package::{Package, PackageKey};
use crate::transport::AckTransport;
use crate::wire::Ack;

/// What the mock does with one emitted package
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    /// Acknowledge with status `received`
    Ack,
    /// Acknowledge with status `rejected`
    Reject,
    /// Never acknowledge
    Timeout,
    /// Fail the emit with an error
    Fail(TransportError),
}

/// A transport that follows a script of outcomes
pub struct MockAckTransport {
    script: Mutex<VecDeque<MockOutcome>>,
    /// Outcome once the script runs out
    fallback: MockOutcome,
    latency: Duration,
    emitted: Mutex<Vec<Package>>,
    connected: AtomicBool,
}

impl Default for MockAckTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAckTransport {
    /// A transport that acknowledges everything immediately
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: MockOutcome::Ack,
            latency: Duration::ZERO,
            emitted: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }

    /// Queue outcomes for the next emits, in order
    pub fn with_script(self, outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        self.script.lock().extend(outcomes);
        self
    }

    /// Outcome used after the script is exhausted
    pub fn with_fallback(mut self, outcome: MockOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    /// Delay before each acknowledgement
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue more outcomes
    pub fn push_outcome(&self, outcome: MockOutcome) {
        self.script.lock().push_back(outcome);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Every package emitted so far, including retries
    pub fn emitted(&self) -> Vec<Package> {
        self.emitted.lock().clone()
    }

    /// Number of emits for one package
    pub fn attempts_for(&self, key: &PackageKey) -> usize {
        self.emitted
            .lock()
            .iter()
            .filter(|p| &p.key() == key)
            .count()
    }

    fn next_outcome(&self) -> MockOutcome {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl AckTransport for MockAckTransport {
    async fn emit(&self, package: &Package) -> Result<Ack, TransportError> {
        self.emitted.lock().push(package.clone());
        let outcome = self.next_outcome();

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match outcome {
            MockOutcome::Ack => Ok(Ack::received()),
            MockOutcome::Reject => Ok(Ack::rejected()),
            MockOutcome::Timeout => std::future::pending::<Result<Ack, TransportError>>().await,
            MockOutcome::Fail(err) => Err(err),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
