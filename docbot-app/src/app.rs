//! Interactive controller: turns commands into session operations and
//! service calls, and listener events into screen updates.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use docbot_collab::{CollabSession, Delivery, ListenerEvent};
use docbot_core::{search, Notice, SessionState, ValidationError};
use docbot_services::{document_id, join_pages, Services, SUPPORTED_LANGUAGES};

use crate::command::{self, Command, SummaryScope, HELP};
use crate::config::AppConfig;
use crate::view::View;

/// What the loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    session: CollabSession,
    services: Services,
    view: View,
    max_document_bytes: u64,
    /// Notices produced by background work (speech playback)
    background_tx: mpsc::UnboundedSender<Notice>,
    background_rx: mpsc::UnboundedReceiver<Notice>,
    /// How much of the shared logs has been printed
    shown_chat: usize,
    shown_remote_annotations: usize,
}

impl App {
    pub fn new(config: &AppConfig, services: Services) -> Self {
        let username = config.username.clone().unwrap_or_else(|| "Anonymous".to_string());
        let state = SessionState::new(username);
        let (background_tx, background_rx) = mpsc::unbounded_channel();

        Self {
            session: CollabSession::new(state, config.collab.clone()),
            services,
            view: View::new(config.color),
            max_document_bytes: config.max_document_bytes,
            background_tx,
            background_rx,
            shown_chat: 0,
            shown_remote_annotations: 0,
        }
    }

    pub fn session(&self) -> &CollabSession {
        &self.session
    }

    /// Read commands from stdin until `quit` or end of input, printing
    /// remote activity as it arrives.
    pub async fn run(mut self) -> Result<()> {
        println!("{}", self.view.status(self.session.state()));
        println!("Type 'help' for commands.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut listener_done = false;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    let output = match command::parse(&line) {
                        Ok(Some(command)) => {
                            let (flow, output) = self.handle(command).await;
                            if flow == Flow::Quit {
                                break;
                            }
                            output
                        }
                        Ok(None) => String::new(),
                        Err(e) => self.view.notice(&Notice::warning(e.to_string())),
                    };
                    self.print(&output);
                }

                event = self.session.next_listener_event(), if !listener_done => {
                    match event {
                        Some(event) => {
                            self.session.apply_listener_event(event);
                            let output = self.remote_updates();
                            self.print(&output);
                        }
                        None => listener_done = true,
                    }
                }

                Some(notice) = self.background_rx.recv() => {
                    self.session.state_mut().notify(notice);
                    self.print("");
                }
            }
        }

        self.session.shutdown();
        log::info!("Session ended");
        Ok(())
    }

    /// Print `output` followed by any pending notices.
    fn print(&mut self, output: &str) {
        let notices = self.session.state_mut().take_notices();
        if !output.is_empty() {
            println!("{output}");
        }
        if !notices.is_empty() {
            println!("{}", self.view.notices(&notices));
        }
    }

    /// Shared-log entries not printed yet.
    pub fn remote_updates(&mut self) -> String {
        let state = self.session.state();
        let mut lines = Vec::new();

        for chat in &state.remote_chat()[self.shown_chat..] {
            if chat.origin != Some(state.session_id()) {
                lines.push(self.view.chat_line(chat));
            }
        }
        for ann in &state.remote_annotations()[self.shown_remote_annotations..] {
            lines.push(format!("New annotation\n{}", self.view.annotation(ann)));
        }

        self.shown_chat = state.remote_chat().len();
        self.shown_remote_annotations = state.remote_annotations().len();
        self.session.state_mut().take_refresh();
        lines.join("\n")
    }

    fn require_page_text(&mut self) -> Option<String> {
        match self.session.state().current_page_text() {
            Some(text) => Some(text.to_string()),
            None => {
                self.warn(ValidationError::NoDocument);
                None
            }
        }
    }

    fn warn(&mut self, message: impl ToString) {
        self.session.state_mut().notify(Notice::warning(message.to_string()));
    }

    pub async fn handle(&mut self, command: Command) -> (Flow, String) {
        let output = match command {
            Command::Quit => return (Flow::Quit, String::new()),
            Command::Help => HELP.to_string(),
            Command::Notices => String::new(),
            Command::User(name) => {
                if let Err(e) = self.session.state_mut().set_username(&name) {
                    self.warn(e);
                }
                String::new()
            }
            Command::Open(path) => self.open(&path).await,
            Command::Next => {
                self.session.state_mut().next_page();
                self.view.page(self.session.state())
            }
            Command::Prev => {
                self.session.state_mut().previous_page();
                self.view.page(self.session.state())
            }
            Command::Page(number) => {
                self.session.state_mut().go_to_page(number.saturating_sub(1));
                self.view.page(self.session.state())
            }
            Command::Show => self.view.page(self.session.state()),
            Command::Annotate { selected, note } => self.annotate(&selected, &note).await,
            Command::Annotations => self.view.annotations(self.session.state()),
            Command::Chat(message) => {
                match self.session.send_message(&message).await {
                    Ok((_, Delivery::Sent)) => log::debug!("Chat message delivered"),
                    Ok((_, Delivery::Failed(_))) => {}
                    Err(e) => self.warn(e),
                }
                // The local copy is already in the log
                self.shown_chat = self.session.state().remote_chat().len();
                self.view.chat(self.session.state())
            }
            Command::History => self.view.chat(self.session.state()),
            Command::Search(term) => {
                let hits = search(self.session.state().pages(), &term, &self.view.highlight());
                self.view.search(&hits)
            }
            Command::Translate { target, text } => self.translate(&target, text).await,
            Command::Speak(text) => self.speak(text),
            Command::Summarize(scope) => self.summarize(scope).await,
        };
        (Flow::Continue, output)
    }

    async fn open(&mut self, path: &Path) -> String {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.session
                    .state_mut()
                    .notify(Notice::error(format!("Cannot read {}: {e}", path.display())));
                return String::new();
            }
        };
        if bytes.len() as u64 > self.max_document_bytes {
            self.session.state_mut().notify(Notice::error(format!(
                "{} is larger than the {} MB limit",
                path.display(),
                self.max_document_bytes / (1024 * 1024)
            )));
            return String::new();
        }

        let started = Instant::now();
        let pdf = self.services.pdf.clone();
        let id = document_id(&bytes);
        let extracted = tokio::task::spawn_blocking(move || pdf.extract(&bytes)).await;

        let pages = match extracted {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => {
                self.session
                    .state_mut()
                    .notify(Notice::error(format!("Error reading PDF: {e}")));
                return String::new();
            }
            Err(e) => {
                self.session
                    .state_mut()
                    .notify(Notice::error(format!("PDF extraction task failed: {e}")));
                return String::new();
            }
        };

        self.session.open_document(id, pages);
        self.session.state_mut().notify(Notice::success(format!(
            "Document processed in {:.2} seconds.",
            started.elapsed().as_secs_f64()
        )));
        self.view.page(self.session.state())
    }

    async fn annotate(&mut self, selected: &str, note: &str) -> String {
        let page_index = self.session.state().current_page();
        match self.session.create_annotation(selected, note, page_index).await {
            Ok(_) => self.view.annotations(self.session.state()),
            Err(e) => {
                self.warn(e);
                String::new()
            }
        }
    }

    async fn translate(&mut self, target: &str, text: Option<String>) -> String {
        if !SUPPORTED_LANGUAGES.iter().any(|(code, _)| *code == target) {
            let codes: Vec<_> = SUPPORTED_LANGUAGES.iter().map(|(code, _)| *code).collect();
            self.warn(format!("Unsupported language '{target}'. Choose one of: {}", codes.join(", ")));
            return String::new();
        }
        let Some(text) = text.or_else(|| self.require_page_text()) else {
            return String::new();
        };

        let outcome = self.services.translator.translate(&text, target).await;
        if let Some(e) = &outcome.error {
            self.session
                .state_mut()
                .notify(Notice::error(format!("Translation error: {e}")));
        }
        format!("Translation Result:\n{}", outcome.text)
    }

    fn speak(&mut self, text: Option<String>) -> String {
        let Some(text) = text.or_else(|| self.require_page_text()) else {
            return String::new();
        };

        let speech = self.services.speech.clone();
        let notices = self.background_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = speech.speak(&text).await {
                log::warn!("Speech failed: {e}");
                let _ = notices.send(Notice::error(format!("Text-to-speech error: {e}")));
            }
        });
        self.session.state_mut().notify(Notice::info("Reading text aloud..."));
        String::new()
    }

    async fn summarize(&mut self, scope: SummaryScope) -> String {
        let text = match scope {
            SummaryScope::Page => match self.require_page_text() {
                Some(text) => text,
                None => return String::new(),
            },
            SummaryScope::Document => {
                if self.session.state().page_count() == 0 {
                    self.warn(ValidationError::NoDocument);
                    return String::new();
                }
                join_pages(self.session.state().pages())
            }
        };

        let summary = self.services.summarizer.summarize(&text).await;
        if let Some(e) = &summary.error {
            self.session
                .state_mut()
                .notify(Notice::error(format!("Summarization error: {e}")));
        }
        format!("Summary:\n{}", summary.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docbot_core::NoticeLevel;
    use docbot_services::{PdfTextSource, ServiceError, SpeechEngine, Summarizer, Summary, TranslateOutcome, Translator};
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    struct FakePdf;

    impl PdfTextSource for FakePdf {
        fn extract(&self, bytes: &[u8]) -> docbot_services::Result<Vec<String>> {
            if bytes.starts_with(b"%PDF") {
                Ok(vec!["The first page".into(), "Second page mentions fish".into()])
            } else {
                Err(ServiceError::Document("not a pdf".into()))
            }
        }
    }

    struct UpperTranslator;

    #[async_trait]
    impl Translator for UpperTranslator {
        async fn translate(&self, text: &str, _target: &str) -> TranslateOutcome {
            TranslateOutcome::translated(text.to_uppercase())
        }
    }

    #[derive(Default)]
    struct RecordingSpeech(Mutex<Vec<String>>);

    #[async_trait]
    impl SpeechEngine for RecordingSpeech {
        async fn speak(&self, text: &str) -> docbot_services::Result<()> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct EchoSummarizer;

    #[async_trait]
    impl Summarizer for EchoSummarizer {
        async fn summarize(&self, text: &str) -> Summary {
            Summary {
                text: format!("{} chars", text.len()),
                error: None,
            }
        }
    }

    fn app() -> App {
        let mut config = AppConfig::default();
        config.username = Some("gil".into());
        config.color = false;
        config.collab.relay_url = "ws://127.0.0.1:1".into();
        config.collab.publish_timeout_ms = 2_000;

        let services = Services {
            pdf: Arc::new(FakePdf),
            translator: Arc::new(UpperTranslator),
            speech: Arc::new(RecordingSpeech::default()),
            summarizer: Arc::new(EchoSummarizer),
        };
        App::new(&config, services)
    }

    async fn opened_app() -> (App, tempfile::NamedTempFile) {
        let mut app = app();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.5 fake").unwrap();
        let (_, output) = app.handle(Command::Open(file.path().to_path_buf())).await;
        assert!(output.starts_with("Page 1 of 2"));
        (app, file)
    }

    fn levels(app: &mut App) -> Vec<NoticeLevel> {
        app.session
            .state_mut()
            .take_notices()
            .into_iter()
            .map(|n| n.level)
            .collect()
    }

    #[tokio::test]
    async fn test_open_loads_pages_and_starts_listener() {
        let (mut app, _file) = opened_app().await;
        assert_eq!(app.session().state().page_count(), 2);
        assert!(app.session().state().listener_started());
        assert!(levels(&mut app).contains(&NoticeLevel::Success));
        app.session.shutdown();
    }

    #[tokio::test]
    async fn test_open_rejects_unreadable_document() {
        let mut app = app();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"garbage").unwrap();

        let (flow, output) = app.handle(Command::Open(file.path().to_path_buf())).await;

        assert_eq!(flow, Flow::Continue);
        assert!(output.is_empty());
        assert_eq!(app.session().state().page_count(), 0);
        assert_eq!(levels(&mut app), vec![NoticeLevel::Error]);
    }

    #[tokio::test]
    async fn test_open_enforces_size_limit() {
        let mut app = app();
        app.max_document_bytes = 4;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.5 fake").unwrap();

        app.handle(Command::Open(file.path().to_path_buf())).await;
        assert_eq!(app.session().state().page_count(), 0);
    }

    #[tokio::test]
    async fn test_navigation_is_clamped() {
        let (mut app, _file) = opened_app().await;
        let (_, output) = app.handle(Command::Page(99)).await;
        assert!(output.starts_with("Page 2 of 2"));
        let (_, output) = app.handle(Command::Next).await;
        assert!(output.starts_with("Page 2 of 2"));
        let (_, output) = app.handle(Command::Page(0)).await;
        assert!(output.starts_with("Page 1 of 2"));
        app.session.shutdown();
    }

    #[tokio::test]
    async fn test_annotation_saved_despite_relay_down() {
        let (mut app, _file) = opened_app().await;
        app.session.state_mut().take_notices();

        let (_, output) = app
            .handle(Command::Annotate {
                selected: "first".into(),
                note: "intro".into(),
            })
            .await;

        assert!(output.contains("note:     intro"));
        assert_eq!(app.session().state().annotations_for_page(0).len(), 1);
        let notices = levels(&mut app);
        assert!(notices.contains(&NoticeLevel::Success));
        assert!(notices.contains(&NoticeLevel::Error));
        app.session.shutdown();
    }

    #[tokio::test]
    async fn test_chat_without_document() {
        let mut app = app();
        let (_, output) = app.handle(Command::Chat("hi all".into())).await;
        assert!(output.contains("gil at "));
        assert_eq!(app.session().state().remote_chat().len(), 1);
        // Own message is not repeated as a remote update
        assert_eq!(app.remote_updates(), "");
    }

    #[tokio::test]
    async fn test_search_translate_summarize() {
        let (mut app, _file) = opened_app().await;

        let (_, output) = app.handle(Command::Search("FISH".into())).await;
        assert!(output.contains("Page 2: Second page mentions [fish]"));

        let (_, output) = app
            .handle(Command::Translate {
                target: "es".into(),
                text: None,
            })
            .await;
        assert_eq!(output, "Translation Result:\nTHE FIRST PAGE");

        let (_, output) = app.handle(Command::Summarize(SummaryScope::Document)).await;
        let joined = "The first page\nSecond page mentions fish".len();
        assert_eq!(output, format!("Summary:\n{joined} chars"));
        app.session.shutdown();
    }

    #[tokio::test]
    async fn test_unsupported_language_is_refused() {
        let mut app = app();
        let (_, output) = app
            .handle(Command::Translate {
                target: "xx".into(),
                text: Some("hello".into()),
            })
            .await;
        assert!(output.is_empty());
        assert_eq!(levels(&mut app), vec![NoticeLevel::Warning]);
    }

    #[tokio::test]
    async fn test_summarize_without_document_warns() {
        let mut app = app();
        app.handle(Command::Summarize(SummaryScope::Page)).await;
        app.handle(Command::Summarize(SummaryScope::Document)).await;
        assert_eq!(levels(&mut app), vec![NoticeLevel::Warning, NoticeLevel::Warning]);
    }

    #[tokio::test]
    async fn test_remote_updates_print_once() {
        let mut app = app();
        let chat = docbot_core::ChatEvent::new("hal", "from afar", uuid::Uuid::new_v4());
        app.session
            .apply_listener_event(ListenerEvent::Remote(chat.into()));

        let first = app.remote_updates();
        assert!(first.contains("hal at "));
        assert_eq!(app.remote_updates(), "");
    }

    #[tokio::test]
    async fn test_quit() {
        let mut app = app();
        assert_eq!(app.handle(Command::Quit).await.0, Flow::Quit);
    }
}
