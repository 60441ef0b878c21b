//! Reference WebSocket relay with room routing.
//!
//! ```text
//! Publisher ──┐                              ┌──► Listener A
//!             ├── /{room} ── BroadcastGroup ─┼──► Listener B
//! Listener C ─┘                              └──► …
//! ```
//!
//! The room is the request path (`/` → [`DEFAULT_ROOM`]). Text frames are
//! forwarded untouched to every other connection in the same room; the
//! relay never parses them.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

use crate::broadcast::{Frame, RoomManager};
use crate::protocol::DEFAULT_ROOM;

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Frames buffered per connection before it lags
    pub broadcast_capacity: usize,
    /// Frames larger than this are dropped (None = unlimited)
    pub max_frame_bytes: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:6789".to_string(),
            broadcast_capacity: 256,
            max_frame_bytes: None,
        }
    }
}

/// Relay statistics.
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    pub total_connections: u64,
    pub active_connections: u64,
    /// Frames accepted and fanned out
    pub total_frames: u64,
    pub total_bytes: u64,
    /// Frames refused for exceeding `max_frame_bytes`
    pub dropped_frames: u64,
    /// Frames skipped by connections that fell behind their room
    pub lagged_frames: u64,
    pub active_rooms: usize,
}

#[derive(Clone)]
struct Shared {
    config: RelayConfig,
    rooms: Arc<RoomManager>,
    stats: Arc<RwLock<RelayStats>>,
}

/// Room-routing WebSocket relay.
pub struct RelayServer {
    shared: Shared,
    next_conn_id: Arc<AtomicU64>,
}

impl RelayServer {
    /// Create a relay; nothing is bound until [`run`](Self::run).
    pub fn new(config: RelayConfig) -> Self {
        let rooms = Arc::new(RoomManager::new(config.broadcast_capacity));
        Self {
            shared: Shared {
                config,
                rooms,
                stats: Arc::new(RwLock::new(RelayStats::default())),
            },
            next_conn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Relay with [`RelayConfig::default`].
    pub fn with_defaults() -> Self {
        Self::new(RelayConfig::default())
    }

    /// Bind the configured address and serve until the listener fails.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.shared.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        log::info!("Relay listening on {}", listener.local_addr()?);

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
            let shared = self.shared.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, conn_id, shared).await {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Snapshot of the relay counters.
    pub async fn stats(&self) -> RelayStats {
        self.shared.stats.read().await.clone()
    }

    /// Configured listen address.
    pub fn bind_addr(&self) -> &str {
        &self.shared.config.bind_addr
    }

    /// Live rooms, for inspection.
    pub fn rooms(&self) -> &Arc<RoomManager> {
        &self.shared.rooms
    }
}

/// Room named by a request path.
fn room_from_path(path: &str) -> String {
    match path.trim_matches('/') {
        "" => DEFAULT_ROOM.to_string(),
        room => room.to_string(),
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    conn_id: u64,
    shared: Shared,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let mut path = String::new();
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        path = req.uri().path().to_string();
        Ok::<_, ErrorResponse>(resp)
    })
    .await?;
    let room_name = room_from_path(&path);
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (room, mut broadcast_rx) = shared.rooms.join(&room_name, conn_id, addr).await;
    {
        let mut s = shared.stats.write().await;
        s.total_connections += 1;
        s.active_connections += 1;
        s.active_rooms = shared.rooms.room_count().await;
    }
    log::info!("Connection {conn_id} from {addr} joined room {room_name}");

    let result = loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            log::warn!("Dropping non-UTF-8 binary frame from {addr}");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        log::debug!("Connection {conn_id} closed by {addr}");
                        break Ok(());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Err(e),
                };

                let len = text.len();
                if shared.config.max_frame_bytes.is_some_and(|max| len > max) {
                    log::warn!("Dropping {len}-byte frame from {addr} (over limit)");
                    shared.stats.write().await.dropped_frames += 1;
                    continue;
                }

                {
                    let mut s = shared.stats.write().await;
                    s.total_frames += 1;
                    s.total_bytes += len as u64;
                }
                room.broadcast(Frame { sender: conn_id, payload: Arc::from(text) });
            }

            frame = broadcast_rx.recv() => {
                match frame {
                    Ok(frame) => {
                        // Don't echo back to the sending connection
                        if frame.sender == conn_id {
                            continue;
                        }
                        if let Err(e) = ws_sender.send(Message::text(frame.payload.to_string())).await {
                            break Err(e);
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        log::warn!("Connection {conn_id} lagged by {n} frames");
                        room.record_lag(n);
                        shared.stats.write().await.lagged_frames += n;
                    }
                    Err(RecvError::Closed) => break Ok(()),
                }
            }
        }
    };

    if shared.rooms.leave(&room_name, conn_id).await {
        log::info!("Room {room_name} removed (empty)");
    }
    {
        let mut s = shared.stats.write().await;
        s.active_connections = s.active_connections.saturating_sub(1);
        s.active_rooms = shared.rooms.room_count().await;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:6789");
        assert_eq!(config.broadcast_capacity, 256);
        assert!(config.max_frame_bytes.is_none());
    }

    #[test]
    fn test_room_from_path() {
        assert_eq!(room_from_path("/"), DEFAULT_ROOM);
        assert_eq!(room_from_path(""), DEFAULT_ROOM);
        assert_eq!(room_from_path("/abc"), "abc");
        assert_eq!(room_from_path("/abc/"), "abc");
    }

    #[tokio::test]
    async fn test_relay_stats_initial() {
        let relay = RelayServer::with_defaults();
        let stats = relay.stats().await;
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.total_frames, 0);
        assert_eq!(stats.dropped_frames, 0);
        assert_eq!(stats.lagged_frames, 0);
        assert_eq!(stats.active_rooms, 0);
        assert_eq!(relay.bind_addr(), "127.0.0.1:6789");
    }
}
