//! Background subscription to the relay.
//!
//! One task per session keeps a connection to `{relay_url}/{room}` open,
//! classifies every incoming frame and forwards the result over an mpsc
//! queue. The task never touches session state; the render loop drains
//! the queue through [`ListenerHandle`].
//!
//! ```text
//!   connect ──► receive loop ──► classify_frame ──► mpsc<ListenerEvent>
//!      ▲              │
//!      │  error/close │
//!      └── backoff ◄──┘        (room switch / shutdown via watch channel)
//! ```

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use docbot_core::RelayEvent;

use crate::config::CollabConfig;
use crate::protocol::{decode_frame, room_url, CollabError};

/// Events delivered from the listener task to the render loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    /// Subscribed (or resubscribed) to a room
    Connected { room: String },
    /// Annotation or chat from another session
    Remote(RelayEvent),
    /// Non-fatal problem: malformed frame or transport failure
    Warning(CollabError),
    /// Relay closed the connection; a reconnect follows
    Closed,
    /// Reconnect policy exhausted; the task has ended
    Stopped,
}

/// Classify one raw frame for the session `local_session`.
///
/// Frames authored by `local_session` are dropped so a sender does not
/// see its own events twice.
pub fn classify_frame(raw: &str, local_session: Uuid) -> Result<Option<RelayEvent>, CollabError> {
    Ok(decode_frame(raw)?.filter(|event| event.origin() != Some(local_session)))
}

/// How a single connection ended.
enum SessionEnd {
    Closed,
    Failed(String),
    Resubscribe,
    Shutdown,
}

type RelayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Relay subscriber for one session.
pub struct Listener {
    config: CollabConfig,
    session_id: Uuid,
}

impl Listener {
    /// Listener for `session_id`; nothing connects until [`spawn`](Self::spawn).
    pub fn new(config: CollabConfig, session_id: Uuid) -> Self {
        Self { config, session_id }
    }

    /// Start the supervised receive loop on the current tokio runtime.
    pub fn spawn(self, room: impl Into<String>) -> ListenerHandle {
        let (event_tx, event_rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let (control_tx, control_rx) = watch::channel(Some(room.into()));
        let task = tokio::spawn(self.run(event_tx, control_rx));

        ListenerHandle {
            events: event_rx,
            control: control_tx,
            task,
        }
    }

    async fn run(
        self,
        tx: mpsc::Sender<ListenerEvent>,
        mut control: watch::Receiver<Option<String>>,
    ) {
        let policy = &self.config.reconnect;
        let mut failures: u32 = 0;

        loop {
            let Some(room) = control.borrow_and_update().clone() else {
                break;
            };
            let url = room_url(&self.config.relay_url, &room);

            let connected = tokio::select! {
                result = tokio_tungstenite::connect_async(url.as_str()) => result,
                changed = control.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            match connected {
                Ok((ws, _)) => {
                    failures = 0;
                    log::info!("Listener subscribed to {url}");
                    if tx.send(ListenerEvent::Connected { room }).await.is_err() {
                        break;
                    }

                    match self.receive(ws, &tx, &mut control).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Resubscribe => continue,
                        SessionEnd::Closed => {
                            log::info!("Relay closed connection {url}");
                            if tx.send(ListenerEvent::Closed).await.is_err() {
                                break;
                            }
                        }
                        SessionEnd::Failed(reason) => {
                            log::warn!("Relay connection {url} failed: {reason}");
                            let warning = ListenerEvent::Warning(CollabError::Transport(reason));
                            if tx.send(warning).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    log::warn!("Listener connect to {url} failed (attempt {failures}): {e}");
                    let warning = ListenerEvent::Warning(CollabError::Transport(e.to_string()));
                    if tx.send(warning).await.is_err() {
                        break;
                    }
                    if policy.exhausted(failures) {
                        log::error!("Giving up on {url} after {failures} attempts");
                        let _ = tx.send(ListenerEvent::Stopped).await;
                        break;
                    }
                }
            }

            let delay = policy.delay_for(failures.max(1));
            log::debug!("Reconnecting in {delay:?}");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = control.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        log::debug!("Listener for session {} stopped", self.session_id);
    }

    async fn receive(
        &self,
        ws: RelayStream,
        tx: &mpsc::Sender<ListenerEvent>,
        control: &mut watch::Receiver<Option<String>>,
    ) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                changed = control.changed() => {
                    let _ = sink.close().await;
                    return match changed {
                        Ok(()) if control.borrow().is_some() => SessionEnd::Resubscribe,
                        _ => SessionEnd::Shutdown,
                    };
                }

                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if !self.dispatch(text.as_str(), tx).await {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            let delivered = match std::str::from_utf8(&data) {
                                Ok(text) => self.dispatch(text, tx).await,
                                Err(e) => {
                                    let warning = CollabError::MalformedEvent(e.to_string());
                                    tx.send(ListenerEvent::Warning(warning)).await.is_ok()
                                }
                            };
                            if !delivered {
                                return SessionEnd::Shutdown;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return SessionEnd::Closed,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return SessionEnd::Failed(e.to_string()),
                    }
                }
            }
        }
    }

    /// Forward one frame. Returns `false` once the render loop is gone.
    async fn dispatch(&self, raw: &str, tx: &mpsc::Sender<ListenerEvent>) -> bool {
        let event = match classify_frame(raw, self.session_id) {
            Ok(Some(event)) => ListenerEvent::Remote(event),
            Ok(None) => {
                log::debug!("Dropping unrecognised or self-authored frame");
                return true;
            }
            Err(e) => {
                log::warn!("{e}");
                ListenerEvent::Warning(e)
            }
        };
        tx.send(event).await.is_ok()
    }
}

/// Owner side of a running listener. Dropping it stops the task.
pub struct ListenerHandle {
    events: mpsc::Receiver<ListenerEvent>,
    control: watch::Sender<Option<String>>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Next queued event without waiting.
    pub fn try_next(&mut self) -> Option<ListenerEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the next event. `None` once the task has ended and the
    /// queue is empty.
    pub async fn next(&mut self) -> Option<ListenerEvent> {
        self.events.recv().await
    }

    /// Room currently subscribed to (None after shutdown).
    pub fn room(&self) -> Option<String> {
        self.control.borrow().clone()
    }

    /// Move the subscription to another room on the same task.
    pub fn switch_room(&self, room: impl Into<String>) {
        let room = room.into();
        self.control.send_if_modified(move |current| {
            if current.as_deref() == Some(room.as_str()) {
                false
            } else {
                *current = Some(room);
                true
            }
        });
    }

    /// Stop the task, even mid-connect or mid-backoff.
    pub fn shutdown(&self) {
        self.control.send_replace(None);
    }

    /// True once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end.
    pub async fn stopped(&mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.control.send_replace(None);
    }
}
