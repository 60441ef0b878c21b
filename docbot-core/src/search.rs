//! Literal, case-insensitive keyword search across page texts.

use regex::{Captures, Regex, RegexBuilder};

/// Characters of context kept on each side of a match.
pub const CONTEXT_CHARS: usize = 100;

/// Markers wrapped around each highlighted occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub open: String,
    pub close: String,
}

impl Highlight {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Bold yellow for terminals.
    pub fn ansi() -> Self {
        Self::new("\x1b[1;33m", "\x1b[0m")
    }
}

impl Default for Highlight {
    fn default() -> Self {
        Self::new("<mark>", "</mark>")
    }
}

/// One occurrence of the search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// 1-based page number
    pub page: usize,
    /// Byte range of the match within the page text
    pub start: usize,
    pub end: usize,
    pub context: String,
    /// `context` with every occurrence wrapped in markers
    pub highlighted: String,
}

/// Find every occurrence of `term` on every page.
///
/// The term is matched literally (no regex syntax) and ignoring case.
/// A blank term yields no hits.
pub fn search(pages: &[String], term: &str, marker: &Highlight) -> Vec<SearchHit> {
    let Some(pattern) = literal_pattern(term) else {
        return Vec::new();
    };

    let mut hits = Vec::new();
    for (index, text) in pages.iter().enumerate() {
        for m in pattern.find_iter(text) {
            let from = context_start(text, m.start());
            let to = context_end(text, m.end());
            let context = &text[from..to];
            hits.push(SearchHit {
                page: index + 1,
                start: m.start(),
                end: m.end(),
                context: context.to_string(),
                highlighted: highlight(context, &pattern, marker),
            });
        }
    }
    log::debug!("Search for {term:?}: {} hit(s)", hits.len());
    hits
}

/// Wrap every match of `pattern` in `text` with the given markers.
pub fn highlight(text: &str, pattern: &Regex, marker: &Highlight) -> String {
    pattern
        .replace_all(text, |caps: &Captures| {
            format!("{}{}{}", marker.open, &caps[0], marker.close)
        })
        .into_owned()
}

fn literal_pattern(term: &str) -> Option<Regex> {
    if term.trim().is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Byte offset `CONTEXT_CHARS` characters before `at`, or 0.
fn context_start(text: &str, at: usize) -> usize {
    text[..at]
        .char_indices()
        .rev()
        .nth(CONTEXT_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Byte offset `CONTEXT_CHARS` characters after `at`, or the end.
fn context_end(text: &str, at: usize) -> usize {
    text[at..]
        .char_indices()
        .nth(CONTEXT_CHARS)
        .map(|(i, _)| at + i)
        .unwrap_or(text.len())
}
