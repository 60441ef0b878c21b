//! # docbot-core — Session state for the document assistant
//!
//! Holds everything a single user session knows about the open document
//! and the collaboration feed, with no I/O of its own.
//!
//! ## Data flow
//!
//! ```text
//!  user action ──► SessionState ──► (event) ──► Publisher (docbot-collab)
//!                       ▲
//!                       │ apply_remote()
//!                       │
//!  Listener task ──► mpsc queue ──► render loop drains
//! ```
//!
//! ## Modules
//!
//! - [`event`] — Annotation/chat events and per-annotation revision records
//! - [`session`] — Session store: navigation, local annotations, chat, notices
//! - [`search`] — Literal keyword search with highlighted context

pub mod event;
pub mod search;
pub mod session;

pub use event::{now_secs, AnnotationEvent, ChatEvent, RelayEvent, RevisionRecord};
pub use search::{highlight, search, Highlight, SearchHit};
pub use session::{Notice, NoticeLevel, SessionState, ValidationError};
