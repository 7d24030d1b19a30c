//! WebSocket transport for the room protocol.
//!
//! Architecture:
//! ```text
//! Client A ──┐
//!            ├── EventRouter ── RoomRegistry (members, buffer, language)
//! Client B ──┘        │
//!                     └── RoomChannel (fan-out)
//!                              │
//!                    ┌─────────┴─────────┐
//!                    ▼                   ▼
//!                 Client A            Client B
//! ```
//!
//! One task per connection multiplexes the websocket stream and the room
//! broadcast subscription through a `select!` loop. A transport disconnect
//! runs the same cleanup as an explicit leave: best-effort, no retry.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::tungstenite::Message;

use crate::broadcast::Frame;
use crate::exec::ExecClient;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::router::{EventRouter, Session};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Broadcast channel capacity per room
    pub channel_capacity: usize,
    /// External code-execution endpoint (None = feature unavailable)
    pub exec_endpoint: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9090".to_string(),
            channel_capacity: 256,
            exec_endpoint: None,
        }
    }
}

/// Server statistics.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_events: u64,
    pub total_bytes: u64,
    pub active_rooms: usize,
}

/// The room server.
pub struct CollabServer {
    config: ServerConfig,
    router: Arc<EventRouter>,
    stats: Arc<RwLock<ServerStats>>,
    exec: Option<Arc<ExecClient>>,
}

impl CollabServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let router = Arc::new(EventRouter::new(config.channel_capacity));
        let exec = config
            .exec_endpoint
            .as_ref()
            .map(|endpoint| Arc::new(ExecClient::new(endpoint.clone())));
        Self {
            config,
            router,
            stats: Arc::new(RwLock::new(ServerStats::default())),
            exec,
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    /// Start listening for WebSocket connections.
    ///
    /// This runs the accept loop. Call from an async runtime.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("room server listening on {}", self.config.bind_addr);

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("new TCP connection from {addr}");

            let router = self.router.clone();
            let stats = self.stats.clone();
            let exec = self.exec.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, router, stats, exec).await {
                    log::error!("connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single WebSocket connection.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        router: Arc<EventRouter>,
        stats: Arc<RwLock<ServerStats>>,
        exec: Option<Arc<ExecClient>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        log::info!("websocket connection established from {addr}");

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        let mut session = Session::new();
        let mut room_rx: Option<broadcast::Receiver<Arc<Frame>>> = None;

        loop {
            tokio::select! {
                // Inbound websocket message
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Binary(data))) => {
                            let bytes: Vec<u8> = data.into();
                            {
                                let mut s = stats.write().await;
                                s.total_events += 1;
                                s.total_bytes += bytes.len() as u64;
                            }
                            match ClientEvent::decode(&bytes) {
                                Ok(event) => match event {
                                    ClientEvent::Join { room_id, display_name } => {
                                        if let Some(rx) =
                                            router.join(&mut session, &room_id, &display_name).await
                                        {
                                            room_rx = Some(rx);
                                            let mut s = stats.write().await;
                                            s.active_rooms = router.room_count().await;
                                        }
                                    }
                                    ClientEvent::CodeChange { room_id, buffer } => {
                                        router.code_change(&session, &room_id, buffer).await;
                                    }
                                    ClientEvent::Typing { room_id, .. } => {
                                        router.typing(&session, &room_id).await;
                                    }
                                    ClientEvent::LanguageChange { room_id, language } => {
                                        router.language_change(&session, &room_id, language).await;
                                    }
                                    ClientEvent::LeaveRoom => {
                                        router.leave(&mut session).await;
                                        room_rx = None;
                                        let mut s = stats.write().await;
                                        s.active_rooms = router.room_count().await;
                                    }
                                    ClientEvent::RunCode { language, buffer } => {
                                        // Stateless side call; the outcome goes to the
                                        // requester alone and never touches room state.
                                        let result = match &exec {
                                            Some(client) => match client.run(&language, &buffer).await {
                                                Ok(output) => ServerEvent::RunResult {
                                                    success: true,
                                                    output,
                                                },
                                                Err(e) => ServerEvent::RunResult {
                                                    success: false,
                                                    output: e.to_string(),
                                                },
                                            },
                                            None => ServerEvent::RunResult {
                                                success: false,
                                                output: "execution service not configured".to_string(),
                                            },
                                        };
                                        if let Ok(encoded) = result.encode() {
                                            ws_sender.send(Message::Binary(encoded.into())).await?;
                                        }
                                    }
                                },
                                Err(e) => {
                                    log::warn!("undecodable frame from {addr}: {e}");
                                }
                            }
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            log::info!("connection closed from {addr}");
                            break;
                        }

                        Some(Ok(Message::Ping(data))) => {
                            ws_sender.send(Message::Pong(data)).await?;
                        }

                        Some(Err(e)) => {
                            log::error!("websocket error from {addr}: {e}");
                            break;
                        }

                        _ => {}
                    }
                }

                // Outbound room frame
                frame = async {
                    if let Some(ref mut rx) = room_rx {
                        rx.recv().await
                    } else {
                        // Not in a room — wait forever
                        std::future::pending().await
                    }
                } => {
                    match frame {
                        Ok(frame) => {
                            if frame.is_for(session.id()) {
                                ws_sender.send(Message::Binary(frame.bytes.clone().into())).await?;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            log::warn!("session {} lagged by {n} frames", session.id());
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            // Room is gone; the session is Anonymous again.
                            room_rx = None;
                        }
                    }
                }
            }
        }

        // Disconnect is an implicit leave.
        router.leave(&mut session).await;
        {
            let mut s = stats.write().await;
            s.active_connections -= 1;
            s.active_rooms = router.room_count().await;
        }

        Ok(())
    }

    /// Get server statistics.
    pub async fn stats(&self) -> ServerStats {
        self.stats.read().await.clone()
    }

    /// Get the configured bind address.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Get the event router.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }
}
