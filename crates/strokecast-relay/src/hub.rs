//! Session fan-out
//!
//! The [`Relay`] groups participants into named sessions. A package sent by
//! one participant is acknowledged to the sender and forwarded, unmodified,
//! to every other participant of the same session. Forwarding is
//! best-effort: each participant has a bounded outbound queue and a full
//! queue drops the forward for that participant only.
//!
//! Every session also runs a [`GapDetector`] over the packages it forwards.
//! It only observes; a gap never holds a package back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use strokecast_core::{
    Ack, ClientMessage, CompletionResult, GapDetector, GapDetectorConfig, Package, ServerMessage,
    StrokeId,
};

use crate::error::{RelayError, RelayResult};

/// Identifies a participant within the relay
pub type ParticipantId = u64;

/// Session used when a client does not name one
pub const DEFAULT_SESSION: &str = "default";

/// Settings for the relay hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each participant's outbound queue
    pub outbound_buffer: usize,
    /// Gap tracking settings for each session
    pub gap: GapDetectorConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
            gap: GapDetectorConfig::default(),
        }
    }
}

struct Session {
    participants: DashMap<ParticipantId, mpsc::Sender<ServerMessage>>,
    detector: GapDetector,
    created_at: DateTime<Utc>,
}

impl Session {
    fn new(gap: GapDetectorConfig) -> Self {
        Self {
            participants: DashMap::new(),
            detector: GapDetector::new(gap),
            created_at: Utc::now(),
        }
    }
}

/// Point-in-time relay counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub sessions: usize,
    pub participants: usize,
    /// Strokes currently tracked across all sessions
    pub strokes: usize,
    pub packages_forwarded: u64,
    pub forwards_dropped: u64,
    pub packages_rejected: u64,
}

/// Result of one maintenance sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub strokes_evicted: usize,
    pub sessions_removed: usize,
}

/// Outcome of fanning one package out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FanOut {
    delivered: usize,
    dropped: usize,
}

/// The relay hub
pub struct Relay {
    config: HubConfig,
    sessions: DashMap<String, Arc<Session>>,
    next_participant: AtomicU64,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
}

impl Relay {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
            next_participant: AtomicU64::new(1),
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    fn session(&self, name: &str) -> RelayResult<Arc<Session>> {
        self.sessions
            .get(name)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| RelayError::UnknownSession(name.to_string()))
    }

    /// Join a session, creating it if needed
    ///
    /// Returns the new participant's id and the receiving end of its
    /// outbound queue.
    pub fn join(&self, session: &str) -> (ParticipantId, mpsc::Receiver<ServerMessage>) {
        let id = self.next_participant.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.outbound_buffer.max(1));

        // Insert under the entry guard so maintenance cannot remove the
        // session between lookup and insertion
        let participants = {
            let entry = self
                .sessions
                .entry(session.to_string())
                .or_insert_with(|| {
                    info!(session, "Session created");
                    Arc::new(Session::new(self.config.gap.clone()))
                });
            entry.participants.insert(id, tx);
            entry.participants.len()
        };

        info!(session, participant = id, participants, "Participant joined");
        (id, rx)
    }

    /// Leave a session; the session itself is removed by maintenance once empty
    pub fn leave(&self, session: &str, participant: ParticipantId) -> bool {
        let Ok(entry) = self.session(session) else {
            return false;
        };
        let removed = entry.participants.remove(&participant).is_some();
        if removed {
            info!(
                session,
                participant,
                participants = entry.participants.len(),
                "Participant left"
            );
        }
        removed
    }

    /// Acknowledge a package and forward it to the rest of the session
    ///
    /// Malformed packages are acknowledged as `rejected` and go nowhere.
    ///
    /// # Errors
    ///
    /// Fails if the session does not exist or the sender is not part of it.
    #[instrument(skip(self, package), fields(package = %package.key(), last = package.is_last()))]
    pub fn forward(
        &self,
        session: &str,
        from: ParticipantId,
        package: Package,
    ) -> RelayResult<Ack> {
        let entry = self.session(session)?;
        if !entry.participants.contains_key(&from) {
            return Err(RelayError::NotJoined {
                session: session.to_string(),
                participant: from,
            });
        }

        if let Err(e) = package.validate() {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Rejecting malformed package");
            return Ok(Ack::rejected());
        }

        let fan_out = Self::fan_out(&entry, from, &package);
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.dropped
            .fetch_add(fan_out.dropped as u64, Ordering::Relaxed);
        debug!(
            delivered = fan_out.delivered,
            dropped = fan_out.dropped,
            "Package forwarded"
        );

        let stroke_id = package.stroke_id().clone();
        let result = entry.detector.add_package(package);
        if result.is_complete {
            info!(
                stroke_id = %stroke_id.short(),
                total_packages = result.total_packages,
                "Stroke complete"
            );
        } else if !result.missing_packages.is_empty() {
            debug!(
                stroke_id = %stroke_id.short(),
                missing = ?result.missing_packages,
                "Stroke has gaps"
            );
        }

        Ok(Ack::received())
    }

    fn fan_out(session: &Session, from: ParticipantId, package: &Package) -> FanOut {
        let mut outcome = FanOut::default();
        for participant in session.participants.iter() {
            if *participant.key() == from {
                continue;
            }
            let message = ServerMessage::ReceivedData {
                data: package.clone(),
            };
            match participant.value().try_send(message) {
                Ok(()) => outcome.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    outcome.dropped += 1;
                    warn!(participant = *participant.key(), "Outbound queue full, forward dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    outcome.dropped += 1;
                    debug!(participant = *participant.key(), "Participant gone, forward dropped");
                }
            }
        }
        outcome
    }

    /// Answer one client message
    ///
    /// Returns the reply for the sending participant.
    pub fn handle_client_message(
        &self,
        session: &str,
        from: ParticipantId,
        message: ClientMessage,
    ) -> RelayResult<ServerMessage> {
        match message {
            ClientMessage::DrawingPacket { ack_id, data } => {
                let ack = self.forward(session, from, data)?;
                Ok(ServerMessage::Ack { ack_id, data: ack })
            }
            ClientMessage::Ping { nonce } => Ok(ServerMessage::Pong { nonce }),
        }
    }

    /// Completion state of a stroke as seen by the relay
    pub fn stroke_status(&self, session: &str, stroke_id: &StrokeId) -> Option<CompletionResult> {
        self.session(session).ok()?.detector.status(stroke_id)
    }

    /// Evict stale strokes and drop sessions nobody is in
    pub fn evict_expired(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        let sessions: Vec<(String, Arc<Session>)> = self
            .sessions
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        for (name, session) in sessions {
            let evicted = session.detector.evict_expired();
            if !evicted.is_empty() {
                debug!(session = %name, evicted = evicted.len(), "Strokes evicted");
            }
            report.strokes_evicted += evicted.len();

            if self
                .sessions
                .remove_if(&name, |_, s| s.participants.is_empty())
                .is_some()
            {
                info!(
                    session = %name,
                    age_secs = (Utc::now() - session.created_at).num_seconds(),
                    "Empty session removed"
                );
                report.sessions_removed += 1;
            }
        }

        report
    }

    pub fn stats(&self) -> RelayStats {
        let mut participants = 0;
        let mut strokes = 0;
        for session in self.sessions.iter() {
            participants += session.participants.len();
            strokes += session.detector.tracked_count();
        }

        RelayStats {
            sessions: self.sessions.len(),
            participants,
            strokes,
            packages_forwarded: self.forwarded.load(Ordering::Relaxed),
            forwards_dropped: self.dropped.load(Ordering::Relaxed),
            packages_rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strokecast_core::Point;

    fn package(id: &str, seq: u32, last: bool) -> Package {
        let points = vec![Point::new(seq as f64, 0.0, 0)];
        if last {
            Package::terminal(StrokeId::new(id), seq, points, 1).unwrap()
        } else {
            Package::data(StrokeId::new(id), seq, points).unwrap()
        }
    }

    #[test]
    fn test_forward_reaches_everyone_but_sender() {
        let relay = Relay::default();
        let (a, mut rx_a) = relay.join("room");
        let (_b, mut rx_b) = relay.join("room");
        let (_c, mut rx_c) = relay.join("room");

        let ack = relay.forward("room", a, package("s", 1, false)).unwrap();
        assert!(ack.is_received());

        assert!(rx_a.try_recv().is_err());
        for rx in [&mut rx_b, &mut rx_c] {
            match rx.try_recv().unwrap() {
                ServerMessage::ReceivedData { data } => assert_eq!(data, package("s", 1, false)),
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }

    #[test]
    fn test_sessions_are_isolated() {
        let relay = Relay::default();
        let (a, _rx_a) = relay.join("one");
        let (_b, mut rx_b) = relay.join("two");

        relay.forward("one", a, package("s", 1, false)).unwrap();
        assert!(rx_b.try_recv().is_err());
        assert_eq!(relay.stats().sessions, 2);
    }

    #[test]
    fn test_malformed_package_rejected() {
        let relay = Relay::default();
        let (a, _rx_a) = relay.join("room");
        let (_b, mut rx_b) = relay.join("room");

        let raw = r#"{"strokeId":"","packageSequenceNumber":1,"points":[]}"#;
        let malformed: Package = serde_json::from_str(raw).unwrap();

        let ack = relay.forward("room", a, malformed).unwrap();
        assert!(!ack.is_received());
        assert!(rx_b.try_recv().is_err());
        assert_eq!(relay.stats().packages_rejected, 1);
    }

    #[test]
    fn test_huge_sequence_rejected_before_fan_out() {
        let relay = Relay::default();
        let (a, _rx_a) = relay.join("room");
        let (_b, mut rx_b) = relay.join("room");

        let raw = r#"{"strokeId":"s","packageSequenceNumber":4000000000,"points":[{"x":1,"y":1}]}"#;
        let oversized: Package = serde_json::from_str(raw).unwrap();

        let ack = relay.forward("room", a, oversized).unwrap();
        assert!(!ack.is_received());
        assert!(rx_b.try_recv().is_err());
        assert!(relay.stroke_status("room", &StrokeId::new("s")).is_none());
        assert_eq!(relay.stats().packages_rejected, 1);
    }

    #[test]
    fn test_unknown_session_and_stranger() {
        let relay = Relay::default();
        assert!(matches!(
            relay.forward("nowhere", 1, package("s", 1, false)),
            Err(RelayError::UnknownSession(_))
        ));

        relay.join("room");
        assert!(matches!(
            relay.forward("room", 999, package("s", 1, false)),
            Err(RelayError::NotJoined { .. })
        ));
    }

    #[test]
    fn test_full_queue_drops_forward() {
        let relay = Relay::new(HubConfig {
            outbound_buffer: 1,
            ..HubConfig::default()
        });
        let (a, _rx_a) = relay.join("room");
        let (_b, mut rx_b) = relay.join("room");

        relay.forward("room", a, package("s", 1, false)).unwrap();
        let ack = relay.forward("room", a, package("s", 2, false)).unwrap();

        // The sender is acknowledged even though b missed the forward
        assert!(ack.is_received());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
        assert_eq!(relay.stats().forwards_dropped, 1);
    }

    #[test]
    fn test_detector_observes_forwarded_packages() {
        let relay = Relay::default();
        let (a, _rx) = relay.join("room");
        let id = StrokeId::new("s");

        relay.forward("room", a, package("s", 2, true)).unwrap();
        let status = relay.stroke_status("room", &id).unwrap();
        assert_eq!(status.missing_packages, vec![1]);

        relay.forward("room", a, package("s", 1, false)).unwrap();
        assert!(relay.stroke_status("room", &id).unwrap().is_complete);
        assert_eq!(relay.stats().strokes, 1);
    }

    #[test]
    fn test_ping_and_drawing_packet_replies() {
        let relay = Relay::default();
        let (a, _rx) = relay.join(DEFAULT_SESSION);

        let pong = relay
            .handle_client_message(DEFAULT_SESSION, a, ClientMessage::Ping { nonce: 5 })
            .unwrap();
        assert_eq!(pong, ServerMessage::Pong { nonce: 5 });

        let reply = relay
            .handle_client_message(
                DEFAULT_SESSION,
                a,
                ClientMessage::DrawingPacket {
                    ack_id: 11,
                    data: package("s", 1, true),
                },
            )
            .unwrap();
        match reply {
            ServerMessage::Ack { ack_id, data } => {
                assert_eq!(ack_id, 11);
                assert!(data.is_received());
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_maintenance_removes_empty_sessions() {
        let relay = Relay::default();
        let (a, _rx_a) = relay.join("busy");
        let (b, _rx_b) = relay.join("idle");

        assert!(relay.leave("idle", b));
        assert!(!relay.leave("idle", b));

        let report = relay.evict_expired();
        assert_eq!(report.sessions_removed, 1);
        assert_eq!(relay.stats().sessions, 1);
        assert_eq!(relay.stats().participants, 1);
        assert!(relay.leave("busy", a));
    }
}
