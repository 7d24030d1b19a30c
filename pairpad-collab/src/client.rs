//! WebSocket client for the room protocol.
//!
//! Provides:
//! - Connection lifecycle (connect, join, leave, disconnect)
//! - Typed room events for the embedding editor
//! - A pending-edit slot for edits made while disconnected
//!
//! The buffer is replicated last-write-wins, so the slot is one deep: on
//! reconnect only the newest buffer and language are worth replaying, and
//! the rejoining client reseeds the room with them.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::protocol::{ClientEvent, ProtocolError, ServerEvent};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events surfaced to the embedding editor.
#[derive(Debug, Clone, PartialEq)]
pub enum CollabEvent {
    /// Connection established and the join was sent.
    Connected,
    /// Connection lost.
    Disconnected,
    /// Presence list after a membership change.
    Presence(Vec<String>),
    /// A peer replaced the shared buffer.
    BufferReplaced(String),
    /// A peer is typing.
    PeerTyping(String),
    /// The room switched language.
    LanguageChanged(String),
    /// Result of a `run_code` request.
    RunFinished { success: bool, output: String },
}

/// Latest edit made while disconnected.
///
/// Recording overwrites: anything older than the newest edit is dead
/// weight under last-write-wins replication.
#[derive(Debug, Default)]
pub struct PendingEdit {
    buffer: Option<String>,
    language: Option<String>,
}

impl PendingEdit {
    pub fn record_buffer(&mut self, buffer: String) {
        self.buffer = Some(buffer);
    }

    pub fn record_language(&mut self, language: String) {
        self.language = Some(language);
    }

    /// Drain the slot for replay.
    pub fn take(&mut self) -> (Option<String>, Option<String>) {
        (self.buffer.take(), self.language.take())
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_none() && self.language.is_none()
    }
}

/// The room client.
pub struct CollabClient {
    /// Display name we join under
    display_name: String,

    /// Room we attach to
    room_id: String,

    /// Server URL
    server_url: String,

    /// Connection state
    state: Arc<RwLock<ConnectionState>>,

    /// Newest edit made while disconnected
    pending: Arc<Mutex<PendingEdit>>,

    /// Channel to the WebSocket writer task
    outgoing_tx: Option<mpsc::Sender<Vec<u8>>>,

    /// Event receiver for the application
    event_rx: Option<mpsc::Receiver<CollabEvent>>,

    /// Event sender (held by the reader task)
    event_tx: mpsc::Sender<CollabEvent>,
}

impl CollabClient {
    /// Create a new client for one room.
    pub fn new(
        display_name: impl Into<String>,
        room_id: impl Into<String>,
        server_url: impl Into<String>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            display_name: display_name.into(),
            room_id: room_id.into(),
            server_url: server_url.into(),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            pending: Arc::new(Mutex::new(PendingEdit::default())),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<CollabEvent>> {
        self.event_rx.take()
    }

    /// Connect to the server and join the room.
    ///
    /// Spawns background tasks for reading/writing WebSocket messages and
    /// flushes the pending-edit slot after the join.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_result = tokio_tungstenite::connect_async(&self.server_url).await;
        let (ws_stream, _) = match ws_result {
            Ok(ok) => ok,
            Err(_e) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Writer task: forward outgoing channel to the WebSocket
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(256);
        self.outgoing_tx = Some(out_tx);
        tokio::spawn(async move {
            while let Some(data) = out_rx.recv().await {
                if ws_writer
                    .send(tokio_tungstenite::tungstenite::Message::Binary(data.into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        // Join first so subsequent edits are scoped to the room.
        self.send_event(&ClientEvent::Join {
            room_id: self.room_id.clone(),
            display_name: self.display_name.clone(),
        })
        .await?;

        *self.state.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(CollabEvent::Connected).await;

        // Replay the newest disconnected edit, if any.
        {
            let mut pending = self.pending.lock().await;
            let (buffer, language) = pending.take();
            if let Some(buffer) = buffer {
                log::info!("replaying pending buffer edit ({} bytes)", buffer.len());
                self.send_event(&ClientEvent::CodeChange {
                    room_id: self.room_id.clone(),
                    buffer,
                })
                .await?;
            }
            if let Some(language) = language {
                self.send_event(&ClientEvent::LanguageChange {
                    room_id: self.room_id.clone(),
                    language,
                })
                .await?;
            }
        }

        // Reader task: map incoming frames to editor events
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(tokio_tungstenite::tungstenite::Message::Binary(data)) => {
                        let bytes: Vec<u8> = data.into();
                        match ServerEvent::decode(&bytes) {
                            Ok(event) => {
                                let mapped = match event {
                                    ServerEvent::UserJoined { members } => {
                                        CollabEvent::Presence(members)
                                    }
                                    ServerEvent::CodeUpdate { buffer } => {
                                        CollabEvent::BufferReplaced(buffer)
                                    }
                                    ServerEvent::UserTyping { display_name } => {
                                        CollabEvent::PeerTyping(display_name)
                                    }
                                    ServerEvent::LanguageUpdate { language } => {
                                        CollabEvent::LanguageChanged(language)
                                    }
                                    ServerEvent::RunResult { success, output } => {
                                        CollabEvent::RunFinished { success, output }
                                    }
                                };
                                let _ = event_tx.send(mapped).await;
                            }
                            Err(e) => {
                                log::warn!("undecodable frame from server: {e}");
                            }
                        }
                    }
                    Ok(tokio_tungstenite::tungstenite::Message::Close(_)) | Err(_) => {
                        break;
                    }
                    _ => {}
                }
            }

            // Connection lost
            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(CollabEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Send the full buffer to the room.
    ///
    /// If disconnected, the edit lands in the pending slot instead.
    pub async fn send_buffer(&self, buffer: String) -> Result<(), ProtocolError> {
        if *self.state.read().await != ConnectionState::Connected {
            self.pending.lock().await.record_buffer(buffer);
            return Ok(());
        }
        self.send_event(&ClientEvent::CodeChange {
            room_id: self.room_id.clone(),
            buffer,
        })
        .await
    }

    /// Send a language switch to the room.
    pub async fn send_language(&self, language: String) -> Result<(), ProtocolError> {
        if *self.state.read().await != ConnectionState::Connected {
            self.pending.lock().await.record_language(language);
            return Ok(());
        }
        self.send_event(&ClientEvent::LanguageChange {
            room_id: self.room_id.clone(),
            language,
        })
        .await
    }

    /// Send a typing notification. Silently dropped when offline; the
    /// indicator is transient and not worth replaying.
    pub async fn send_typing(&self) -> Result<(), ProtocolError> {
        if *self.state.read().await != ConnectionState::Connected {
            return Ok(());
        }
        self.send_event(&ClientEvent::Typing {
            room_id: self.room_id.clone(),
            display_name: self.display_name.clone(),
        })
        .await
    }

    /// Ask the server to run a buffer through the execution service.
    pub async fn run_code(&self, language: String, buffer: String) -> Result<(), ProtocolError> {
        self.send_event(&ClientEvent::RunCode { language, buffer }).await
    }

    /// Leave the room without closing the connection.
    pub async fn leave(&self) -> Result<(), ProtocolError> {
        self.send_event(&ClientEvent::LeaveRoom).await
    }

    async fn send_event(&self, event: &ClientEvent) -> Result<(), ProtocolError> {
        let encoded = event.encode()?;
        match &self.outgoing_tx {
            Some(tx) => tx
                .send(encoded)
                .await
                .map_err(|_| ProtocolError::ConnectionClosed),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Get the current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Get the display name this client joins under.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Get the room this client attaches to.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Get the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Whether an edit is waiting for reconnect.
    pub async fn has_pending_edit(&self) -> bool {
        !self.pending.lock().await.is_empty()
    }
}
