//! # pairpad-collab — real-time room layer for pairpad
//!
//! Multiple clients attach to a named room, share one text buffer and one
//! language tag (replicated last-write-wins), and see who else is present.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     WebSocket      ┌──────────────┐
//! │ CollabClient │ ◄────────────────► │ CollabServer │
//! │  (per user)  │   binary events    │  (central)   │
//! └──────────────┘                    └──────┬───────┘
//!                                            │
//!                                     ┌──────┴───────┐
//!                                     │ EventRouter  │
//!                                     │ (state gate) │
//!                                     └──────┬───────┘
//!                              ┌─────────────┼─────────────┐
//!                              ▼             ▼             ▼
//!                        RoomRegistry   RoomChannel    ExecClient
//!                        (membership,   (fan-out to    (optional
//!                         documents)     members)      side call)
//! ```
//!
//! Each room holds the member list, the current buffer, and the current
//! language tag. Edits replace the buffer outright (there is no merge), so
//! the newest write always wins and a room dies the moment its last member
//! leaves.
//!
//! ## Modules
//!
//! - [`protocol`] — closed inbound/outbound event enums (bincode wire frames)
//! - [`registry`] — room → member set plus shared document state
//! - [`broadcast`] — per-room fan-out with sender exclusion
//! - [`router`] — per-session state machine and fan-out rules
//! - [`server`] — WebSocket transport
//! - [`client`] — WebSocket client counterpart
//! - [`exec`] — stateless code-execution passthrough

pub mod broadcast;
pub mod client;
pub mod exec;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;

// Re-exports for convenience
pub use broadcast::{Frame, RoomChannel};
pub use client::{CollabClient, CollabEvent, ConnectionState, PendingEdit};
pub use exec::{ExecClient, ExecError, ExecRequest, ExecResponse};
pub use protocol::{ClientEvent, ProtocolError, ServerEvent};
pub use registry::{LeaveOutcome, Member, Room, RoomRegistry, DEFAULT_BUFFER, DEFAULT_LANGUAGE};
pub use router::{EventRouter, Session, SessionState};
pub use server::{CollabServer, ServerConfig, ServerStats};
