//! Translation through a LibreTranslate-compatible HTTP endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Target languages offered to the user: (code, display name).
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("zh-cn", "Chinese (Simplified)"),
    ("ja", "Japanese"),
    ("ru", "Russian"),
];

/// Check a target code against [`SUPPORTED_LANGUAGES`].
pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(c, _)| *c == code)
}

/// Result of a translation. On failure `text` is the untouched input and
/// `error` says why.
#[derive(Debug)]
pub struct TranslateOutcome {
    pub text: String,
    pub error: Option<ServiceError>,
}

impl TranslateOutcome {
    pub fn translated(text: String) -> Self {
        Self { text, error: None }
    }

    pub fn fallback(original: &str, error: ServiceError) -> Self {
        Self {
            text: original.to_string(),
            error: Some(error),
        }
    }

    pub fn is_translated(&self) -> bool {
        self.error.is_none()
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Never fails outright: errors fall back to the original text.
    async fn translate(&self, text: &str, target: &str) -> TranslateOutcome;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Client for a LibreTranslate-compatible server.
pub struct HttpTranslator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.into(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// LibreTranslate names Simplified Chinese `zh`.
    fn endpoint_code(target: &str) -> &str {
        match target {
            "zh-cn" => "zh",
            other => other,
        }
    }

    async fn request(&self, text: &str, target: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(ServiceError::EmptyInput);
        }
        if !is_supported(target) {
            return Err(ServiceError::Api(format!("unsupported target language '{target}'")));
        }

        let body = TranslateRequest {
            q: text,
            source: "auto",
            target: Self::endpoint_code(target),
            format: "text",
            api_key: self.api_key.as_deref(),
        };
        let url = format!("{}/translate", self.base_url.trim_end_matches('/'));
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api(format!("{status}: {}", detail.trim())));
        }

        let parsed: TranslateResponse = response.json().await?;
        Ok(parsed.translated_text)
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, target: &str) -> TranslateOutcome {
        match self.request(text, target).await {
            Ok(translated) => TranslateOutcome::translated(translated),
            Err(e) => {
                log::warn!("Translation to {target} failed: {e}");
                TranslateOutcome::fallback(text, e)
            }
        }
    }
}
