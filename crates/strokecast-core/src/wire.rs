//! Wire protocol for strokecast
//!
//! Messages are JSON objects tagged by an `event` field, matching the
//! event names used by browser clients:
//!
//! - `drawing-packet` (client to relay, acknowledged)
//! - `ack` (relay to sender)
//! - `recieved-data` (relay to every other participant, fire-and-forget)
//! - `ping` / `pong` (liveness, informational only)

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::package::Package;

/// Event name for packages sent by a drawing client
pub const DRAWING_PACKET_EVENT: &str = "drawing-packet";

/// Event name for packages forwarded by the relay
pub const RECEIVED_DATA_EVENT: &str = "recieved-data";

/// Acknowledgement status reported by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Received,
    Rejected,
}

/// Acknowledgement payload for a `drawing-packet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: AckStatus,
    /// Relay wall-clock time in Unix milliseconds
    pub timestamp: i64,
}

impl Ack {
    pub fn received() -> Self {
        Self {
            status: AckStatus::Received,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn rejected() -> Self {
        Self {
            status: AckStatus::Rejected,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn is_received(&self) -> bool {
        self.status == AckStatus::Received
    }
}

/// Messages sent from a drawing client to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// A stroke package that must be acknowledged under `ack_id`
    #[serde(rename = "drawing-packet")]
    DrawingPacket { ack_id: u64, data: Package },

    #[serde(rename = "ping")]
    Ping { nonce: u64 },
}

/// Messages sent from the relay to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Acknowledgement of the `drawing-packet` sent under `ack_id`
    #[serde(rename = "ack")]
    Ack { ack_id: u64, data: Ack },

    /// A package forwarded unmodified from another participant
    #[serde(rename = "recieved-data")]
    ReceivedData { data: Package },

    #[serde(rename = "pong")]
    Pong { nonce: u64 },
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::StrokeId;
    use crate::point::Point;

    fn package() -> Package {
        Package::data(StrokeId::new("s1"), 1, vec![Point::new(1.0, 2.0, 3)]).unwrap()
    }

    #[test]
    fn test_drawing_packet_envelope() {
        let msg = ClientMessage::DrawingPacket {
            ack_id: 9,
            data: package(),
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["event"], DRAWING_PACKET_EVENT);
        assert_eq!(json["ackId"], 9);
        assert_eq!(json["data"]["strokeId"], "s1");
    }

    #[test]
    fn test_received_data_event_name() {
        let msg = ServerMessage::ReceivedData { data: package() };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], RECEIVED_DATA_EVENT);
    }

    #[test]
    fn test_ack_payload_shape() {
        let raw = r#"{"event":"ack","ackId":4,"data":{"status":"received","timestamp":1700000000000}}"#;
        let msg = ServerMessage::from_json(raw).unwrap();

        match msg {
            ServerMessage::Ack { ack_id, data } => {
                assert_eq!(ack_id, 4);
                assert!(data.is_received());
                assert_eq!(data.timestamp, 1_700_000_000_000);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let err = ClientMessage::from_json(r#"{"event":"chat_message","text":"hi"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessageFormat(_)));
    }

    #[test]
    fn test_ping_decodes() {
        let msg = ClientMessage::from_json(r#"{"event":"ping","nonce":12}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping { nonce: 12 });
    }
}
