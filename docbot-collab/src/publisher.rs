//! One-shot delivery of a local event to the relay.
//!
//! Each call opens a fresh connection, writes a single text frame and
//! closes. Nothing is awaited from the relay: "delivered" means the write
//! succeeded, not that any peer received it.

use std::time::Duration;

use futures_util::SinkExt;
use tokio_tungstenite::tungstenite::Message;

use docbot_core::RelayEvent;

use crate::protocol::{encode_event, room_url, CollabError};

/// Sends single events to one relay room.
pub struct Publisher {
    url: String,
    timeout: Duration,
}

impl Publisher {
    /// Publisher for `room` on the relay at `relay_url`.
    pub fn new(relay_url: &str, room: &str) -> Self {
        Self {
            url: room_url(relay_url, room),
            timeout: Duration::from_secs(5),
        }
    }

    /// Bound connect + send + close by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full room URL frames are sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send `event` on a new connection. No retry.
    pub async fn publish(&self, event: &RelayEvent) -> Result<(), CollabError> {
        let payload = encode_event(event)?;

        tokio::time::timeout(self.timeout, self.send_once(payload))
            .await
            .map_err(|_| {
                CollabError::Publish(format!("timed out after {:?} sending to {}", self.timeout, self.url))
            })??;

        log::debug!("Published {} event to {}", event.kind(), self.url);
        Ok(())
    }

    async fn send_once(&self, payload: String) -> Result<(), CollabError> {
        let publish_err = |e: tokio_tungstenite::tungstenite::Error| {
            CollabError::Publish(format!("{}: {e}", self.url))
        };

        let (mut ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(publish_err)?;
        ws.send(Message::text(payload)).await.map_err(publish_err)?;
        ws.close(None).await.map_err(publish_err)?;
        Ok(())
    }
}
