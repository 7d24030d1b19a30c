//! Per-room fan-out with sender exclusion.
//!
//! One tokio broadcast channel per room gives O(1) send to all members.
//! Frames are encoded once and shared as `Arc`; the origin travels beside
//! the bytes so each receiver can drop its own echoes without decoding.
//! Sends never block; a receiver that falls more than `capacity` frames
//! behind starts dropping, which the transport logs and survives.
//!
//! Reference: Kleppmann — Designing Data-Intensive Applications, Chapter 8

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::protocol::{ProtocolError, ServerEvent};

/// A single outbound frame: pre-encoded event plus its origin.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Session the frame originated from, when the fan-out excludes it.
    /// `None` means everyone in the room receives the frame.
    pub origin: Option<Uuid>,
    /// Encoded `ServerEvent` bytes, shared across receivers.
    pub bytes: Vec<u8>,
}

impl Frame {
    /// Whether this frame should be delivered to the given session.
    pub fn is_for(&self, session: Uuid) -> bool {
        self.origin != Some(session)
    }
}

/// Fan-out channel for one room.
///
/// Created when the room is, dropped when the room empties. `capacity`
/// bounds how many frames a slow receiver may buffer before it lags.
pub struct RoomChannel {
    sender: broadcast::Sender<Arc<Frame>>,
    frames_sent: AtomicU64,
}

impl RoomChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            frames_sent: AtomicU64::new(0),
        }
    }

    /// Subscribe a session to this room's frames.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Frame>> {
        self.sender.subscribe()
    }

    /// Encode once and fan out. Fire-and-forget; returns the number of
    /// receivers the frame reached.
    pub fn send(
        &self,
        origin: Option<Uuid>,
        event: &ServerEvent,
    ) -> Result<usize, ProtocolError> {
        let bytes = event.encode()?;
        let count = self.sender.send(Arc::new(Frame { origin, bytes })).unwrap_or(0);
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok(count)
    }

    /// Frames sent over this channel's lifetime.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Live receiver count.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out_reaches_all_receivers() {
        let channel = RoomChannel::new(16);
        let mut rx1 = channel.subscribe();
        let mut rx2 = channel.subscribe();

        let event = ServerEvent::CodeUpdate {
            buffer: "x = 1".into(),
        };
        let count = channel.send(Some(Uuid::new_v4()), &event).unwrap();
        assert_eq!(count, 2);

        let frame = rx1.recv().await.unwrap();
        assert_eq!(ServerEvent::decode(&frame.bytes).unwrap(), event);
        let frame = rx2.recv().await.unwrap();
        assert_eq!(ServerEvent::decode(&frame.bytes).unwrap(), event);
    }

    #[test]
    fn test_frame_excludes_its_origin() {
        let sender = Uuid::new_v4();
        let other = Uuid::new_v4();
        let frame = Frame {
            origin: Some(sender),
            bytes: Vec::new(),
        };
        assert!(!frame.is_for(sender));
        assert!(frame.is_for(other));
    }

    #[test]
    fn test_frame_without_origin_reaches_everyone() {
        let frame = Frame {
            origin: None,
            bytes: Vec::new(),
        };
        assert!(frame.is_for(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_send_without_receivers_is_not_an_error() {
        let channel = RoomChannel::new(16);
        let event = ServerEvent::UserTyping {
            display_name: "alice".into(),
        };
        let count = channel.send(None, &event).unwrap();
        assert_eq!(count, 0);
        assert_eq!(channel.frames_sent(), 1);
    }

    #[tokio::test]
    async fn test_receiver_count_tracks_subscriptions() {
        let channel = RoomChannel::new(16);
        assert_eq!(channel.receiver_count(), 0);
        let rx = channel.subscribe();
        assert_eq!(channel.receiver_count(), 1);
        drop(rx);
        assert_eq!(channel.receiver_count(), 0);
    }
}
