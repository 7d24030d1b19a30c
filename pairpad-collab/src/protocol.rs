//! Wire protocol for the room event stream.
//!
//! Every websocket frame carries exactly one bincode-encoded event. Inbound
//! and outbound events are closed enums, one variant per protocol event, so
//! a malformed frame fails at the decode boundary and can never cause a
//! partial update.
//!
//! ```text
//! client ──ClientEvent──► server ──ServerEvent──► room members
//! ```

use serde::{Deserialize, Serialize};

/// Events a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// Enter a room under a display name. Creates the room on first use.
    Join { room_id: String, display_name: String },
    /// Replace the room's shared buffer. Last write wins.
    CodeChange { room_id: String, buffer: String },
    /// Transient typing notification. The server keeps no state for it.
    Typing { room_id: String, display_name: String },
    /// Replace the room's language tag.
    LanguageChange { room_id: String, language: String },
    /// Leave the current room. No payload; the server uses session state.
    LeaveRoom,
    /// Run a buffer through the external execution service.
    RunCode { language: String, buffer: String },
}

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// Presence snapshot after a membership change.
    UserJoined { members: Vec<String> },
    /// A peer replaced the shared buffer.
    CodeUpdate { buffer: String },
    /// A peer is typing. Receivers clear the indicator on their own timer.
    UserTyping { display_name: String },
    /// A peer switched the room's language.
    LanguageUpdate { language: String },
    /// Outcome of a `RunCode` request. Sent only to the requester.
    RunResult { success: bool, output: String },
}

impl ClientEvent {
    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (event, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(event)
    }
}

impl ServerEvent {
    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ProtocolError::SerializationError(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (event, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
        Ok(event)
    }
}

/// Protocol errors.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    ConnectionClosed,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_roundtrip() {
        let event = ClientEvent::Join {
            room_id: "r1".into(),
            display_name: "alice".into(),
        };
        let encoded = event.encode().unwrap();
        assert_eq!(ClientEvent::decode(&encoded).unwrap(), event);
    }

    #[test]
    fn test_leave_room_carries_no_payload() {
        let encoded = ClientEvent::LeaveRoom.encode().unwrap();
        assert_eq!(ClientEvent::decode(&encoded).unwrap(), ClientEvent::LeaveRoom);
    }

    #[test]
    fn test_presence_roundtrip() {
        let event = ServerEvent::UserJoined {
            members: vec!["alice".into(), "bob".into()],
        };
        let encoded = event.encode().unwrap();
        assert_eq!(ServerEvent::decode(&encoded).unwrap(), event);
    }

    #[test]
    fn test_run_result_roundtrip() {
        let event = ServerEvent::RunResult {
            success: false,
            output: "execution service not configured".into(),
        };
        let encoded = event.encode().unwrap();
        assert_eq!(ServerEvent::decode(&encoded).unwrap(), event);
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        assert!(ClientEvent::decode(&garbage).is_err());
        assert!(ServerEvent::decode(&garbage).is_err());
    }

    #[test]
    fn test_buffer_is_opaque() {
        // The buffer travels verbatim, binary-looking text included.
        let event = ClientEvent::CodeChange {
            room_id: "r1".into(),
            buffer: "x = 1 \u{0} \n\t∀".into(),
        };
        let encoded = event.encode().unwrap();
        match ClientEvent::decode(&encoded).unwrap() {
            ClientEvent::CodeChange { buffer, .. } => assert_eq!(buffer, "x = 1 \u{0} \n\t∀"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
