//! Glue between [`SessionState`] and the relay.
//!
//! Local mutations happen first and are never rolled back; publishing
//! follows and a failure only adds a notice. Remote deliveries are applied
//! when the render loop calls [`CollabSession::pump`] or feeds events from
//! [`CollabSession::next_listener_event`] into
//! [`CollabSession::apply_listener_event`].

use uuid::Uuid;

use docbot_core::{AnnotationEvent, ChatEvent, Notice, RelayEvent, SessionState};

use crate::config::CollabConfig;
use crate::listener::{Listener, ListenerEvent, ListenerHandle};
use crate::protocol::{CollabError, DEFAULT_ROOM};
use crate::publisher::Publisher;

/// Outcome of the publish step after a successful local append.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Sent,
    Failed(CollabError),
}

impl Delivery {
    /// True if the relay accepted the event.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Session state plus its relay listener and publisher.
pub struct CollabSession {
    state: SessionState,
    config: CollabConfig,
    listener: Option<ListenerHandle>,
}

impl CollabSession {
    /// Wrap `state`; the listener starts with the first document.
    pub fn new(state: SessionState, config: CollabConfig) -> Self {
        Self {
            state,
            config,
            listener: None,
        }
    }

    /// Read-only view of the session.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Mutable access for purely local changes.
    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Relay settings in use.
    pub fn config(&self) -> &CollabConfig {
        &self.config
    }

    /// Relay room for the open document.
    pub fn room(&self) -> String {
        self.state
            .document_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| DEFAULT_ROOM.to_string())
    }

    /// Load a document and make sure the listener follows it.
    ///
    /// The listener is started on the first call only; later documents
    /// move the same subscription to their room.
    pub fn open_document(&mut self, document_id: Uuid, pages: Vec<String>) {
        self.state.load_document(document_id, pages);
        if !self.ensure_listener() {
            if let Some(listener) = &self.listener {
                listener.switch_room(self.room());
            }
        }
    }

    /// Start the listener if this session never has. Returns whether it
    /// was started by this call.
    pub fn ensure_listener(&mut self) -> bool {
        if !self.state.mark_listener_started() {
            return false;
        }
        let room = self.room();
        log::info!("Starting relay listener for session {} in room {room}", self.state.session_id());
        let listener = Listener::new(self.config.clone(), self.state.session_id());
        self.listener = Some(listener.spawn(room));
        true
    }

    /// True while the listener task is alive.
    pub fn listener_running(&self) -> bool {
        self.listener.as_ref().is_some_and(|l| !l.is_finished())
    }

    fn publisher(&self) -> Publisher {
        Publisher::new(&self.config.relay_url, &self.room()).with_timeout(self.config.publish_timeout())
    }

    /// Create an annotation on `page_index`, then publish it.
    pub async fn create_annotation(
        &mut self,
        selected_text: &str,
        annotation_text: &str,
        page_index: usize,
    ) -> Result<(AnnotationEvent, Delivery), CollabError> {
        let event = self
            .state
            .create_annotation(selected_text, annotation_text, page_index)?;
        let delivery = self
            .publish(event.clone().into(), "Failed to send annotation to collaboration server")
            .await;
        Ok((event, delivery))
    }

    /// Append a chat message to the shared log, then publish it.
    pub async fn send_message(&mut self, text: &str) -> Result<(ChatEvent, Delivery), CollabError> {
        let event = self.state.post_chat(text)?;
        let delivery = self
            .publish(event.clone().into(), "Failed to send chat message to collaboration server")
            .await;
        Ok((event, delivery))
    }

    async fn publish(&mut self, event: RelayEvent, failure: &str) -> Delivery {
        match self.publisher().publish(&event).await {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                self.state.notify(Notice::error(format!("{failure}: {e}")));
                Delivery::Failed(e)
            }
        }
    }

    /// Apply everything already queued by the listener. Returns the number
    /// of events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.listener.as_mut().and_then(ListenerHandle::try_next) {
            self.apply_listener_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for the next listener event. Pending forever when no listener
    /// is running, so it can sit in a `select!` next to user input.
    pub async fn next_listener_event(&mut self) -> Option<ListenerEvent> {
        match self.listener.as_mut() {
            Some(listener) => listener.next().await,
            None => std::future::pending().await,
        }
    }

    /// Fold one listener event into the session.
    pub fn apply_listener_event(&mut self, event: ListenerEvent) {
        match event {
            ListenerEvent::Connected { room } => {
                log::debug!("Listener connected to room {room}");
            }
            ListenerEvent::Remote(remote) => {
                self.state.apply_remote(remote);
            }
            ListenerEvent::Warning(CollabError::MalformedEvent(reason)) => {
                self.state.notify(Notice::error(format!(
                    "Error processing collaborative message: {reason}"
                )));
            }
            ListenerEvent::Warning(e) => {
                self.state.notify(Notice::warning(format!("WebSocket error: {e}")));
            }
            ListenerEvent::Closed => {
                self.state.notify(Notice::info("WebSocket connection closed."));
            }
            ListenerEvent::Stopped => {
                self.state.notify(Notice::warning(
                    "Stopped reconnecting to the collaboration server.",
                ));
            }
        }
    }

    /// Stop the listener task, if any.
    pub fn shutdown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
        }
    }
}
