//! Per-session state store.
//!
//! The render loop is the only writer. Remote deliveries reach it as
//! [`RelayEvent`]s pulled off the listener queue and handed to
//! [`SessionState::apply_remote`], so no lock guards these collections.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use uuid::Uuid;

use crate::event::{AnnotationEvent, ChatEvent, RelayEvent, RevisionRecord};

/// Rejected user input. Never mutates state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("page index {index} out of range for {count} page(s)")]
    PageOutOfRange { index: usize, count: usize },
    #[error("no document loaded")]
    NoDocument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Inline, non-fatal message for the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, text)
    }
}

/// Everything one user session knows.
#[derive(Debug)]
pub struct SessionState {
    session_id: Uuid,
    username: String,

    /// Identity of the open document (None = nothing uploaded yet)
    document_id: Option<Uuid>,
    /// Derived text, one entry per page
    pages: Vec<String>,
    current_page: usize,

    /// Page index → annotations authored here, in creation order
    local_annotations: BTreeMap<usize, Vec<AnnotationEvent>>,
    revision_history: HashMap<String, RevisionRecord>,

    /// Arrival order, not timestamp order
    remote_annotations: Vec<AnnotationEvent>,
    remote_chat: Vec<ChatEvent>,

    listener_started: bool,
    notices: Vec<Notice>,
    refresh_requested: bool,
}

impl SessionState {
    /// Empty session with a fresh session id.
    pub fn new(username: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), username)
    }

    /// Create with explicit session id (for testing)
    pub fn with_id(session_id: Uuid, username: impl Into<String>) -> Self {
        Self {
            session_id,
            username: username.into().trim().to_string(),
            document_id: None,
            pages: Vec::new(),
            current_page: 0,
            local_annotations: BTreeMap::new(),
            revision_history: HashMap::new(),
            remote_annotations: Vec::new(),
            remote_chat: Vec::new(),
            listener_started: false,
            notices: Vec::new(),
            refresh_requested: false,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Trim and store a display name; blank input is rejected.
    pub fn set_username(&mut self, input: &str) -> Result<(), ValidationError> {
        let name = input.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField("username"));
        }
        self.username = name.to_string();
        self.notify(Notice::success(format!("Username set to '{name}'")));
        Ok(())
    }

    // ── Document & navigation ───────────────────────────────────────

    /// Replace the open document. Navigation restarts at the first page.
    pub fn load_document(&mut self, document_id: Uuid, pages: Vec<String>) {
        log::info!("Loaded document {document_id} ({} pages)", pages.len());
        self.document_id = Some(document_id);
        self.pages = pages;
        self.current_page = 0;
        self.request_refresh();
    }

    pub fn document_id(&self) -> Option<Uuid> {
        self.document_id
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn current_page_text(&self) -> Option<&str> {
        self.pages.get(self.current_page).map(String::as_str)
    }

    /// Advance one page. Stops at the last page; returns whether it moved.
    pub fn next_page(&mut self) -> bool {
        if self.current_page + 1 < self.page_count() {
            self.current_page += 1;
            self.request_refresh();
            true
        } else {
            false
        }
    }

    /// Go back one page. Stops at the first page; returns whether it moved.
    pub fn previous_page(&mut self) -> bool {
        if self.current_page > 0 {
            self.current_page -= 1;
            self.request_refresh();
            true
        } else {
            false
        }
    }

    /// Jump to `index`, clamped into `0..page_count`.
    pub fn go_to_page(&mut self, index: usize) {
        let target = index.min(self.page_count().saturating_sub(1));
        if target != self.current_page {
            self.current_page = target;
            self.request_refresh();
        }
    }

    // ── Annotations ─────────────────────────────────────────────────

    /// Record a new local annotation and seed its revision history.
    ///
    /// The caller is responsible for publishing the returned event; the
    /// local copy stays regardless of how that goes.
    pub fn create_annotation(
        &mut self,
        selected_text: &str,
        annotation_text: &str,
        page_index: usize,
    ) -> Result<AnnotationEvent, ValidationError> {
        if selected_text.trim().is_empty() {
            return Err(ValidationError::EmptyField("selected text"));
        }
        if annotation_text.trim().is_empty() {
            return Err(ValidationError::EmptyField("annotation"));
        }
        if self.pages.is_empty() {
            return Err(ValidationError::NoDocument);
        }
        if page_index >= self.page_count() {
            return Err(ValidationError::PageOutOfRange {
                index: page_index,
                count: self.page_count(),
            });
        }

        let event = AnnotationEvent::new(
            page_index,
            selected_text,
            annotation_text,
            self.username.clone(),
            self.session_id,
        );

        self.local_annotations
            .entry(page_index)
            .or_default()
            .push(event.clone());
        self.revision_history
            .insert(event.id.clone(), RevisionRecord::new(event.clone()));

        self.notify(Notice::success("Annotation saved locally!"));
        self.request_refresh();
        Ok(event)
    }

    /// Local annotations on 0-based `page_index`, oldest first.
    pub fn annotations_for_page(&self, page_index: usize) -> &[AnnotationEvent] {
        self.local_annotations
            .get(&page_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn local_annotations(&self) -> &BTreeMap<usize, Vec<AnnotationEvent>> {
        &self.local_annotations
    }

    /// History for one local annotation.
    pub fn revisions(&self, annotation_id: &str) -> Option<&RevisionRecord> {
        self.revision_history.get(annotation_id)
    }

    // ── Chat ────────────────────────────────────────────────────────

    /// Append an outgoing chat line to the shared chat log.
    pub fn post_chat(&mut self, text: &str) -> Result<ChatEvent, ValidationError> {
        let message = text.trim();
        if message.is_empty() {
            return Err(ValidationError::EmptyField("message"));
        }

        let event = ChatEvent::new(self.username.clone(), message, self.session_id);
        self.remote_chat.push(event.clone());
        self.request_refresh();
        Ok(event)
    }

    // ── Remote feed ─────────────────────────────────────────────────

    /// Append an event delivered by the relay.
    ///
    /// Returns `false` when the event was already present (same chat id).
    pub fn apply_remote(&mut self, event: RelayEvent) -> bool {
        match event {
            RelayEvent::Annotation(annotation) => {
                log::debug!("Remote annotation {} on page {}", annotation.id, annotation.page);
                self.remote_annotations.push(annotation);
            }
            RelayEvent::Chat(chat) => {
                if chat.id.is_some() && self.remote_chat.iter().any(|c| c.id == chat.id) {
                    log::trace!("Skipping duplicate chat {:?}", chat.id);
                    return false;
                }
                self.remote_chat.push(chat);
            }
        }
        self.request_refresh();
        true
    }

    pub fn remote_annotations(&self) -> &[AnnotationEvent] {
        &self.remote_annotations
    }

    pub fn remote_chat(&self) -> &[ChatEvent] {
        &self.remote_chat
    }

    // ── Listener gate ───────────────────────────────────────────────

    /// Flip the listener flag. `true` only on the first call.
    pub fn mark_listener_started(&mut self) -> bool {
        !std::mem::replace(&mut self.listener_started, true)
    }

    pub fn listener_started(&self) -> bool {
        self.listener_started
    }

    // ── Notices & refresh ───────────────────────────────────────────

    /// Queue a notice for the view.
    pub fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Warning => log::warn!("{}", notice.text),
            NoticeLevel::Error => log::error!("{}", notice.text),
            NoticeLevel::Info | NoticeLevel::Success => log::info!("{}", notice.text),
        }
        self.notices.push(notice);
        self.request_refresh();
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    /// Read and clear the refresh flag.
    pub fn take_refresh(&mut self) -> bool {
        std::mem::replace(&mut self.refresh_requested, false)
    }
}
