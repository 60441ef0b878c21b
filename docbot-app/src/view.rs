//! Text rendering of session state for the terminal.

use std::fmt::Write;

use chrono::{DateTime, Local};

use docbot_core::{AnnotationEvent, ChatEvent, Highlight, Notice, NoticeLevel, SearchHit, SessionState};

/// Local wall-clock time for an epoch timestamp.
pub fn format_time(timestamp: f64, pattern: &str) -> String {
    let secs = timestamp.floor() as i64;
    let nanos = ((timestamp - timestamp.floor()) * 1e9) as u32;
    match DateTime::from_timestamp(secs, nanos) {
        Some(utc) => utc.with_timezone(&Local).format(pattern).to_string(),
        None => "--:--:--".to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct View {
    color: bool,
}

impl View {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn highlight(&self) -> Highlight {
        if self.color {
            Highlight::ansi()
        } else {
            Highlight::new("[", "]")
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn notice(&self, notice: &Notice) -> String {
        let (label, code) = match notice.level {
            NoticeLevel::Info => ("info", "36"),
            NoticeLevel::Success => ("ok", "32"),
            NoticeLevel::Warning => ("warn", "33"),
            NoticeLevel::Error => ("error", "31"),
        };
        format!("{} {}", self.paint(code, &format!("[{label}]")), notice.text)
    }

    pub fn notices(&self, notices: &[Notice]) -> String {
        notices
            .iter()
            .map(|n| self.notice(n))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn status(&self, state: &SessionState) -> String {
        if state.page_count() == 0 {
            return "No document loaded. Use 'open <file.pdf>'.".to_string();
        }
        self.paint(
            "1",
            &format!("Page {} of {}", state.current_page() + 1, state.page_count()),
        )
    }

    pub fn page(&self, state: &SessionState) -> String {
        match state.current_page_text() {
            Some(text) => format!("{}\n{}\n{}", self.status(state), "-".repeat(40), text.trim_end()),
            None => self.status(state),
        }
    }

    /// Local annotations for the current page with their revision history,
    /// then every collaborative annotation received so far.
    pub fn annotations(&self, state: &SessionState) -> String {
        let mut out = String::new();
        let local = state.annotations_for_page(state.current_page());

        if local.is_empty() {
            out.push_str("No local annotations for this page yet.\n");
        } else {
            out.push_str("Your annotations for this page:\n");
            for ann in local {
                let _ = writeln!(out, "{}", self.annotation(ann));
                if let Some(revisions) = state.revisions(&ann.id) {
                    out.push_str("    Revision history:\n");
                    for (i, rev) in revisions.iter().enumerate() {
                        let _ = writeln!(
                            out,
                            "      {}. {}: {}",
                            i + 1,
                            format_time(rev.timestamp, "%Y-%m-%d %H:%M:%S"),
                            rev.annotation_text
                        );
                    }
                }
            }
        }

        let remote = state.remote_annotations();
        if remote.is_empty() {
            out.push_str("No collaborative annotations received yet.");
        } else {
            out.push_str("Collaborative annotations from other users:");
            for ann in remote {
                let _ = write!(out, "\n{}", self.annotation(ann));
            }
        }
        out
    }

    pub fn annotation(&self, ann: &AnnotationEvent) -> String {
        let user = if ann.user.is_empty() { "Unknown" } else { &ann.user };
        format!(
            "  {} on page {}:\n    selected: {}\n    note:     {}",
            self.paint("1", user),
            ann.page,
            ann.selected_text,
            ann.annotation_text
        )
    }

    pub fn chat_line(&self, chat: &ChatEvent) -> String {
        let user = if chat.user.is_empty() { "Anonymous" } else { &chat.user };
        format!(
            "{} at {}: {}",
            self.paint("1", user),
            format_time(chat.timestamp, "%H:%M:%S"),
            chat.message
        )
    }

    pub fn chat(&self, state: &SessionState) -> String {
        if state.remote_chat().is_empty() {
            return "No chat messages yet.".to_string();
        }
        state
            .remote_chat()
            .iter()
            .map(|c| self.chat_line(c))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn search(&self, hits: &[SearchHit]) -> String {
        if hits.is_empty() {
            return "No matches found in the document.".to_string();
        }
        let mut out = format!("Found {} match(es):", hits.len());
        for hit in hits {
            let context = hit.highlighted.replace('\n', " ");
            let _ = write!(out, "\n  Page {}: {}", hit.page, context.trim());
        }
        out
    }
}
