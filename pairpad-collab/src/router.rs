//! Event routing: the per-session state machine and its fan-out rules.
//!
//! ```text
//! Disconnected ──connect──► Anonymous ──Join──► InRoom ──LeaveRoom /──► Anonymous
//!                                                        disconnect
//! ```
//!
//! Every inbound event is gated on the session's state before anything is
//! mutated: events sent while `Anonymous`, or addressed to a room the
//! session is not in, are dropped silently (not propagated, not errored
//! back). An event either fully applies, mutation plus broadcast, or leaves
//! no trace.
//!
//! The registry and the room-channel map live together behind one lock,
//! and every mutation+broadcast pair runs under the write guard with no
//! await point inside. That single discipline is what makes per-room apply
//! order equal arrival order on a multi-threaded host.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::broadcast::{Frame, RoomChannel};
use crate::protocol::ServerEvent;
use crate::registry::{LeaveOutcome, RoomRegistry};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Connected but not yet in any room.
    Anonymous,
    /// Joined; events are scoped to this room until leave or disconnect.
    InRoom {
        room_id: String,
        display_name: String,
    },
}

/// One live connection's identity and routing state.
///
/// Owned by the connection task; the router never stores sessions.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Anonymous,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether this session is currently joined to `room_id`.
    pub fn is_in_room(&self, room_id: &str) -> bool {
        matches!(&self.state, SessionState::InRoom { room_id: r, .. } if r == room_id)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

struct RouterInner {
    registry: RoomRegistry,
    channels: HashMap<String, RoomChannel>,
}

/// The event router.
///
/// Validates inbound events against the session state machine, mutates the
/// [`RoomRegistry`], and fans the resulting broadcasts out through the
/// per-room channels.
pub struct EventRouter {
    inner: RwLock<RouterInner>,
    channel_capacity: usize,
}

impl EventRouter {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(RouterInner {
                registry: RoomRegistry::new(),
                channels: HashMap::new(),
            }),
            channel_capacity,
        }
    }

    /// `Anonymous → InRoom`. The only transition that creates a room.
    ///
    /// Subscribes the session to the room channel, then broadcasts the
    /// presence snapshot with no origin so the joiner receives it too.
    /// Returns the subscription for the connection task, or `None` when the
    /// event is gated off (the session is already in a room).
    pub async fn join(
        &self,
        session: &mut Session,
        room_id: &str,
        display_name: &str,
    ) -> Option<broadcast::Receiver<Arc<Frame>>> {
        if session.state != SessionState::Anonymous {
            log::debug!("session {} sent join while in a room; ignored", session.id);
            return None;
        }

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let members = inner.registry.create_or_join(room_id, session.id, display_name);
        let channel = inner
            .channels
            .entry(room_id.to_string())
            .or_insert_with(|| RoomChannel::new(self.channel_capacity));
        let rx = channel.subscribe();
        let _ = channel.send(None, &ServerEvent::UserJoined { members });
        drop(guard);

        session.state = SessionState::InRoom {
            room_id: room_id.to_string(),
            display_name: display_name.to_string(),
        };
        log::info!(
            "session {} joined room {room_id:?} as {display_name:?}",
            session.id
        );
        Some(rx)
    }

    /// Apply a buffer edit and relay it to the other members.
    pub async fn code_change(&self, session: &Session, room_id: &str, buffer: String) {
        if !session.is_in_room(room_id) {
            return;
        }
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        inner.registry.update_buffer(room_id, buffer.clone());
        if let Some(channel) = inner.channels.get(room_id) {
            let _ = channel.send(Some(session.id), &ServerEvent::CodeUpdate { buffer });
        }
    }

    /// Relay a typing notification to the other members.
    ///
    /// No registry mutation; the server holds no typing state. The relayed
    /// name is the session's registered one, so an inconsistent payload
    /// cannot impersonate another member.
    pub async fn typing(&self, session: &Session, room_id: &str) {
        let SessionState::InRoom {
            room_id: current,
            display_name,
        } = &session.state
        else {
            return;
        };
        if current != room_id {
            return;
        }
        let guard = self.inner.read().await;
        if let Some(channel) = guard.channels.get(room_id) {
            let _ = channel.send(
                Some(session.id),
                &ServerEvent::UserTyping {
                    display_name: display_name.clone(),
                },
            );
        }
    }

    /// Apply a language switch and relay it to the other members.
    pub async fn language_change(&self, session: &Session, room_id: &str, language: String) {
        if !session.is_in_room(room_id) {
            return;
        }
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        inner.registry.update_language(room_id, language.clone());
        if let Some(channel) = inner.channels.get(room_id) {
            let _ = channel.send(Some(session.id), &ServerEvent::LanguageUpdate { language });
        }
    }

    /// `InRoom → Anonymous`, also the disconnect path. Idempotent: a
    /// session that is already `Anonymous` reports nothing.
    ///
    /// The post-leave presence snapshot carries the leaver as origin, so
    /// only the remaining members receive it. When the room was removed no
    /// broadcast target remains and the channel is dropped with it.
    pub async fn leave(&self, session: &mut Session) {
        let state = std::mem::replace(&mut session.state, SessionState::Anonymous);
        let SessionState::InRoom { room_id, .. } = state else {
            return;
        };

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        match inner.registry.leave(&room_id, session.id) {
            LeaveOutcome::Remaining(members) => {
                if let Some(channel) = inner.channels.get(&room_id) {
                    let _ = channel.send(Some(session.id), &ServerEvent::UserJoined { members });
                }
            }
            LeaveOutcome::RoomRemoved => {
                inner.channels.remove(&room_id);
            }
            LeaveOutcome::NotMember => {}
        }
        drop(guard);
        log::info!("session {} left room {room_id:?}", session.id);
    }

    /// Presence snapshot; empty for unknown rooms.
    pub async fn members(&self, room_id: &str) -> Vec<String> {
        self.inner.read().await.registry.members(room_id)
    }

    /// Current (buffer, language) of a room, if it exists.
    pub async fn document_state(&self, room_id: &str) -> Option<(String, String)> {
        let guard = self.inner.read().await;
        guard
            .registry
            .room(room_id)
            .map(|r| (r.buffer().to_string(), r.language().to_string()))
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.inner.read().await.registry.room_count()
    }
}
