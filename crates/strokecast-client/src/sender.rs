//! Acknowledged package sending with bounded retries
//!
//! Every package is emitted through an [`AckTransport`] and the sender
//! waits up to `ack_timeout` for the relay's acknowledgement. A timeout,
//! a `rejected` acknowledgement or a retryable transport error counts as a
//! failed attempt. After the initial attempt up to `max_retries` retries
//! follow, the k-th one delayed by `backoff_step * k`. A package that still
//! fails is dropped and reported; the sender never blocks the stroke on it.
//!
//! Packages awaiting acknowledgement sit in a ledger keyed by stroke id and
//! package sequence number. Each `send` owns its own entry, so any number
//! of packages can be retrying concurrently.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, instrument, warn};

use strokecast_core::{Ack, AckTransport, Package, PackageKey, TransportError};

use crate::config::SenderConfig;
use crate::error::{SendError, SendResult};
use crate::metrics::{TransmissionLog, TransmissionRecord};

/// A package awaiting acknowledgement
#[derive(Debug, Clone)]
pub struct PendingPackage {
    pub package: Package,
    /// When the initial attempt was made
    pub first_sent_at: Instant,
    /// Attempts made so far
    pub attempts: u32,
}

/// A successfully acknowledged package
#[derive(Debug, Clone)]
pub struct Delivery {
    pub key: PackageKey,
    pub ack: Ack,
    /// Attempts it took, including the successful one
    pub attempts: u32,
    /// Round-trip time of the successful attempt
    pub rtt: Duration,
}

/// Sends packages over an acknowledged transport
pub struct PackageSender<T: AckTransport> {
    transport: Arc<T>,
    config: SenderConfig,
    ledger: DashMap<PackageKey, PendingPackage>,
    log: TransmissionLog,
}

impl<T: AckTransport> PackageSender<T> {
    pub fn new(transport: T, config: SenderConfig) -> Self {
        Self::with_shared(Arc::new(transport), config)
    }

    /// Create a sender over a transport that is also used elsewhere
    pub fn with_shared(transport: Arc<T>, config: SenderConfig) -> Self {
        let log = TransmissionLog::new(config.log_capacity);
        Self {
            transport,
            config,
            ledger: DashMap::new(),
            log,
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn log(&self) -> &TransmissionLog {
        &self.log
    }

    /// Packages currently awaiting acknowledgement
    pub fn pending(&self) -> Vec<PendingPackage> {
        self.ledger.iter().map(|e| e.value().clone()).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_pending(&self, key: &PackageKey) -> bool {
        self.ledger.contains_key(key)
    }

    /// Send one package and wait until it is acknowledged or given up on
    ///
    /// # Errors
    ///
    /// - [`SendError::Malformed`] if the package fails validation; nothing is sent
    /// - [`SendError::AlreadyInFlight`] if the same package is already being sent
    /// - [`SendError::Connection`] if the connection could not be established
    /// - [`SendError::RetriesExhausted`] once every attempt has failed
    #[instrument(skip(self, package), fields(package = %package.key(), points = package.points().len()))]
    pub async fn send(&self, package: Package) -> SendResult<Delivery> {
        if let Err(e) = package.validate() {
            warn!(error = %e, "Refusing to send malformed package");
            return Err(SendError::Malformed(e));
        }

        let key = package.key();
        if self.ledger.contains_key(&key) {
            warn!("Package already in flight");
            return Err(SendError::AlreadyInFlight(key));
        }

        let payload_bytes = serde_json::to_vec(&package).map(|b| b.len()).unwrap_or(0);
        self.ledger.insert(
            key.clone(),
            PendingPackage {
                package: package.clone(),
                first_sent_at: Instant::now(),
                attempts: 0,
            },
        );

        let mut retry = 0u32;
        loop {
            let attempt = retry + 1;
            if let Some(mut entry) = self.ledger.get_mut(&key) {
                entry.attempts = attempt;
            }

            let started = Instant::now();
            let result = self.attempt(&package).await;
            let rtt = started.elapsed();

            self.log.record(TransmissionRecord {
                key: key.clone(),
                attempt,
                payload_bytes,
                rtt,
                acknowledged: result.is_ok(),
            });

            match result {
                Ok(ack) => {
                    self.ledger.remove(&key);
                    debug!(attempt, rtt_ms = rtt.as_millis() as u64, "Package acknowledged");
                    return Ok(Delivery {
                        key,
                        ack,
                        attempts: attempt,
                        rtt,
                    });
                }
                Err(err) if !err.is_retryable() => {
                    self.ledger.remove(&key);
                    error!(error = %err, "Connection failed, not retrying");
                    return Err(SendError::Connection { key, error: err });
                }
                Err(err) if retry < self.config.max_retries => {
                    retry += 1;
                    let backoff = self.config.backoff_for(retry);
                    warn!(
                        attempt,
                        retry,
                        max_retries = self.config.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Send attempt failed, retrying"
                    );
                    sleep(backoff).await;
                }
                Err(err) => {
                    self.ledger.remove(&key);
                    error!(attempts = attempt, error = %err, "Package dropped after exhausting retries");
                    return Err(SendError::RetriesExhausted {
                        key,
                        attempts: attempt,
                        last_error: err,
                    });
                }
            }
        }
    }

    /// One emit, bounded by the acknowledgement timeout
    async fn attempt(&self, package: &Package) -> Result<Ack, TransportError> {
        match timeout(self.config.ack_timeout, self.transport.emit(package)).await {
            Ok(Ok(ack)) if ack.is_received() => Ok(ack),
            Ok(Ok(_)) => Err(TransportError::Rejected(format!(
                "relay rejected package {}",
                package.key()
            ))),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(TransportError::AckTimeout(self.config.ack_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strokecast_core::{MockAckTransport, MockOutcome, Point, StrokeId};

    fn package(seq: u32) -> Package {
        Package::data(
            StrokeId::new("stroke-a"),
            seq,
            vec![Point::new(1.0, 1.0, 0), Point::new(2.0, 2.0, 1)],
        )
        .unwrap()
    }

    fn sender(transport: MockAckTransport) -> PackageSender<MockAckTransport> {
        PackageSender::new(transport, SenderConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_acknowledged() {
        let sender = sender(MockAckTransport::new());
        let delivery = sender.send(package(1)).await.unwrap();

        assert_eq!(delivery.attempts, 1);
        assert!(delivery.ack.is_received());
        assert_eq!(sender.pending_count(), 0);
        assert_eq!(sender.log().summary().acknowledged, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_linear_backoff() {
        let transport = MockAckTransport::new().with_script([
            MockOutcome::Reject,
            MockOutcome::Fail(TransportError::SendFailed("socket busy".into())),
            MockOutcome::Ack,
        ]);
        let sender = sender(transport);

        let start = Instant::now();
        let delivery = sender.send(package(1)).await.unwrap();

        assert_eq!(delivery.attempts, 3);
        // 100ms before the first retry, 200ms before the second
        assert_eq!(start.elapsed(), Duration::from_millis(300));
        assert_eq!(sender.transport().attempts_for(&package(1).key()), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let transport = MockAckTransport::new().with_fallback(MockOutcome::Timeout);
        let sender = sender(transport);

        let start = Instant::now();
        let err = sender.send(package(2)).await.unwrap_err();

        match err {
            SendError::RetriesExhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(last_error, TransportError::AckTimeout(Duration::from_secs(1)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // Four 1s timeouts plus 100 + 200 + 300ms of backoff
        assert_eq!(start.elapsed(), Duration::from_millis(4600));
        assert_eq!(sender.transport().emitted().len(), 4);
        assert_eq!(sender.pending_count(), 0);

        let summary = sender.log().summary();
        assert_eq!(summary.attempts, 4);
        assert_eq!(summary.failed, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failure_is_not_retried() {
        let transport = MockAckTransport::new().with_script([MockOutcome::Fail(
            TransportError::ConnectionFailed("cors".into()),
        )]);
        let sender = sender(transport);

        let err = sender.send(package(1)).await.unwrap_err();
        assert!(matches!(err, SendError::Connection { .. }));
        assert_eq!(sender.transport().emitted().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_package_never_sent() {
        let raw = r#"{"strokeId":"","packageSequenceNumber":1,"points":[]}"#;
        let malformed: Package = serde_json::from_str(raw).unwrap();
        let sender = sender(MockAckTransport::new());

        let err = sender.send(malformed).await.unwrap_err();
        assert!(matches!(err, SendError::Malformed(_)));
        assert!(sender.transport().emitted().is_empty());
        assert_eq!(sender.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ledger_tracks_concurrent_retries() {
        let transport = MockAckTransport::new().with_fallback(MockOutcome::Timeout);
        let sender = Arc::new(sender(transport));

        let a = tokio::spawn({
            let sender = sender.clone();
            async move { sender.send(package(1)).await }
        });
        let b = tokio::spawn({
            let sender = sender.clone();
            async move { sender.send(package(2)).await }
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(sender.pending_count(), 2);
        assert!(sender.is_pending(&package(1).key()));
        assert!(sender.pending().iter().all(|p| p.attempts == 2));

        let dup = sender.send(package(1)).await.unwrap_err();
        assert!(matches!(dup, SendError::AlreadyInFlight(_)));

        assert!(a.await.unwrap().is_err());
        assert!(b.await.unwrap().is_err());
        assert_eq!(sender.pending_count(), 0);
    }
}
