use std::time::Duration;

use serde::{Deserialize, Serialize};

/// OCR fallback settings for pages without a text layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,
    /// Rasteriser (poppler-utils)
    pub pdftoppm: String,
    pub tesseract: String,
    pub dpi: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pdftoppm: "pdftoppm".to_string(),
            tesseract: "tesseract".to_string(),
            dpi: 300,
        }
    }
}

/// Settings for every external collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// LibreTranslate-compatible endpoint
    pub translate_url: String,
    pub translate_api_key: Option<String>,

    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,

    pub speech_program: String,
    /// Words per minute
    pub speech_rate: u32,

    /// Bound on every HTTP request
    pub request_timeout_secs: u64,

    pub ocr: OcrConfig,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            translate_url: "http://127.0.0.1:5000".to_string(),
            translate_api_key: None,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-3.5-turbo".to_string(),
            speech_program: "espeak".to_string(),
            speech_rate: 150,
            request_timeout_secs: 30,
            ocr: OcrConfig::default(),
        }
    }
}

impl ServicesConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
