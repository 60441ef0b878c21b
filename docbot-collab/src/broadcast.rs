//! Room fan-out for the relay server.
//!
//! Each room owns one tokio broadcast channel; every connection in the
//! room holds a receiver. Frames carry the sending connection id so the
//! relay can skip echoing a frame back to its author connection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

/// An opaque text frame in flight through a room.
#[derive(Debug, Clone)]
pub struct Frame {
    pub sender: u64,
    pub payload: Arc<str>,
}

/// Statistics for monitoring broadcast health.
#[derive(Debug, Clone, Default)]
pub struct BroadcastStats {
    pub frames_sent: u64,
    pub frames_lagged: u64,
    pub active_connections: usize,
}

/// All connections subscribed to one room.
pub struct BroadcastGroup {
    sender: broadcast::Sender<Frame>,

    /// Connection id → peer address
    connections: RwLock<HashMap<u64, SocketAddr>>,

    /// Frames buffered per receiver before it starts lagging
    capacity: usize,

    frames_sent: AtomicU64,
    frames_lagged: AtomicU64,
}

impl BroadcastGroup {
    /// Create an empty group buffering `capacity` frames per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            connections: RwLock::new(HashMap::new()),
            capacity,
            frames_sent: AtomicU64::new(0),
            frames_lagged: AtomicU64::new(0),
        }
    }

    /// Register a connection and hand back its receiver.
    pub async fn join(&self, conn_id: u64, addr: SocketAddr) -> broadcast::Receiver<Frame> {
        self.connections.write().await.insert(conn_id, addr);
        self.sender.subscribe()
    }

    /// Unregister a connection, returning its address if it was present.
    pub async fn leave(&self, conn_id: u64) -> Option<SocketAddr> {
        self.connections.write().await.remove(&conn_id)
    }

    /// Fan a frame out to every receiver in the room, the sender's own
    /// included (filtering is the caller's job). Returns the receiver count.
    pub fn broadcast(&self, frame: Frame) -> usize {
        let count = self.sender.send(frame).unwrap_or(0);
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Count frames a lagging receiver skipped.
    pub fn record_lag(&self, skipped: u64) {
        self.frames_lagged.fetch_add(skipped, Ordering::Relaxed);
    }

    /// Number of connections currently in the room.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Check whether a connection is in the room.
    pub async fn has_connection(&self, conn_id: u64) -> bool {
        self.connections.read().await.contains_key(&conn_id)
    }

    /// Snapshot of the group's counters.
    pub async fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_lagged: self.frames_lagged.load(Ordering::Relaxed),
            active_connections: self.connection_count().await,
        }
    }

    /// Per-receiver buffer size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Room name → broadcast group. Rooms are isolated from each other.
pub struct RoomManager {
    rooms: RwLock<HashMap<String, Arc<BroadcastGroup>>>,
    default_capacity: usize,
}

impl RoomManager {
    /// Create a manager whose rooms buffer `default_capacity` frames.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            default_capacity,
        }
    }

    /// Join `room`, creating it if needed.
    ///
    /// Lookup and registration happen under the room-map write lock, so a
    /// room is never removed between the two.
    pub async fn join(
        &self,
        room: &str,
        conn_id: u64,
        addr: SocketAddr,
    ) -> (Arc<BroadcastGroup>, broadcast::Receiver<Frame>) {
        let mut rooms = self.rooms.write().await;
        let group = rooms
            .entry(room.to_string())
            .or_insert_with(|| Arc::new(BroadcastGroup::new(self.default_capacity)))
            .clone();
        let rx = group.join(conn_id, addr).await;
        (group, rx)
    }

    /// Leave `room`, dropping the room once its last connection is gone.
    /// Returns true if the room was removed.
    pub async fn leave(&self, room: &str, conn_id: u64) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(group) = rooms.get(room) else {
            return false;
        };
        group.leave(conn_id).await;
        if group.connection_count().await == 0 {
            rooms.remove(room);
            return true;
        }
        false
    }

    /// Look up a room, creating it if needed.
    pub async fn get_or_create(&self, room: &str) -> Arc<BroadcastGroup> {
        // Fast path: read lock
        {
            let rooms = self.rooms.read().await;
            if let Some(group) = rooms.get(room) {
                return group.clone();
            }
        }

        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room.to_string())
            .or_insert_with(|| Arc::new(BroadcastGroup::new(self.default_capacity)))
            .clone()
    }

    /// Drop the room if nobody is left in it and no handle from
    /// [`get_or_create`](Self::get_or_create) is still outstanding.
    pub async fn remove_if_empty(&self, room: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        if let Some(group) = rooms.get(room) {
            if Arc::strong_count(group) == 1 && group.connection_count().await == 0 {
                rooms.remove(room);
                return true;
            }
        }
        false
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Names of the live rooms, in no particular order.
    pub async fn active_rooms(&self) -> Vec<String> {
        self.rooms.read().await.keys().cloned().collect()
    }
}
