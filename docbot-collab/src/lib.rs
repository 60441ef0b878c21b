//! # docbot-collab — Real-time annotation & chat relay plumbing
//!
//! Connects a [`docbot_core::SessionState`] to a broadcast relay over
//! WebSocket using JSON text frames.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  one-shot conn   ┌─────────────┐
//! │  Publisher   │ ───────────────► │             │
//! └──────────────┘                  │ RelayServer │
//! ┌──────────────┐  long-lived conn │  (rooms)    │
//! │ Listener task│ ◄─────────────── │             │
//! └──────┬───────┘                  └─────────────┘
//!        │ mpsc<ListenerEvent>
//!        ▼
//! ┌──────────────┐
//! │ CollabSession│ ── drained by the render loop ──► SessionState
//! └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — JSON wire codec and error type
//! - [`listener`] — Supervised subscription with reconnect/backoff
//! - [`publisher`] — One-shot sender
//! - [`session`] — Glue between session state and the network
//! - [`broadcast`] — Room-based fan-out used by the relay
//! - [`relay`] — Reference WebSocket relay server

pub mod broadcast;
pub mod config;
pub mod listener;
pub mod protocol;
pub mod publisher;
pub mod relay;
pub mod session;

// Re-exports for convenience
pub use broadcast::{BroadcastGroup, BroadcastStats, Frame, RoomManager};
pub use config::{CollabConfig, ReconnectPolicy};
pub use listener::{classify_frame, Listener, ListenerEvent, ListenerHandle};
pub use protocol::{decode_frame, encode_event, room_url, CollabError, DEFAULT_ROOM};
pub use publisher::Publisher;
pub use relay::{RelayConfig, RelayServer, RelayStats};
pub use session::{CollabSession, Delivery};
