//! # docbot-services — External collaborators
//!
//! Thin wrappers around the things a document session leans on but does
//! not own: PDF text extraction (with OCR fallback), translation, speech
//! and summarization. Each sits behind a trait so callers can swap in
//! their own implementation.
//!
//! ## Modules
//!
//! - [`pdf`] — lopdf text layer + `pdftoppm`/`tesseract` OCR
//! - [`translate`] — LibreTranslate-compatible HTTP client
//! - [`speech`] — command-line TTS
//! - [`summarize`] — OpenAI chat completions

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod pdf;
pub mod speech;
pub mod summarize;
pub mod translate;

pub use config::{OcrConfig, ServicesConfig};
pub use error::{Result, ServiceError};
pub use pdf::{document_id, LopdfTextSource, OcrEngine, PdfTextSource, TesseractOcr};
pub use speech::{CommandSpeech, SpeechEngine};
pub use summarize::{join_pages, OpenAiSummarizer, Summarizer, Summary};
pub use translate::{HttpTranslator, TranslateOutcome, Translator, SUPPORTED_LANGUAGES};

/// The full set of collaborators a session uses. Shared handles so
/// blocking work can move onto another thread.
#[derive(Clone)]
pub struct Services {
    pub pdf: Arc<dyn PdfTextSource>,
    pub translator: Arc<dyn Translator>,
    pub speech: Arc<dyn SpeechEngine>,
    pub summarizer: Arc<dyn Summarizer>,
}

impl Services {
    /// Build the default implementations from configuration.
    pub fn from_config(config: &ServicesConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let translator = HttpTranslator::new(&config.translate_url, timeout)?
            .with_api_key(config.translate_api_key.clone());
        let summarizer = OpenAiSummarizer::new(config.openai_api_key.clone(), timeout)?
            .with_base_url(&config.openai_base_url)
            .with_model(&config.openai_model);

        if config.openai_api_key.is_none() {
            log::warn!("OPENAI_API_KEY not set; summaries will be unavailable");
        }

        Ok(Self {
            pdf: Arc::new(LopdfTextSource::from_config(&config.ocr)),
            translator: Arc::new(translator),
            speech: Arc::new(CommandSpeech::new(&config.speech_program, config.speech_rate)),
            summarizer: Arc::new(summarizer),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_services_from_default_config() {
        let services = Services::from_config(&ServicesConfig::default()).unwrap();
        let summary = services.summarizer.summarize("anything").await;
        assert_eq!(summary.text, summarize::UNAVAILABLE);
    }
}
