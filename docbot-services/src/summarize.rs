//! Summaries through the OpenAI chat-completions API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes text concisely.";
pub const UNAVAILABLE: &str = "Summarization unavailable.";
pub const FAILED: &str = "Summarization failed.";

const MAX_TOKENS: u32 = 150;
const TEMPERATURE: f32 = 0.5;

/// Join extracted pages into the text of a whole-document summary.
pub fn join_pages(pages: &[String]) -> String {
    pages.join("\n")
}

/// Summary text, or a placeholder plus the reason when it failed.
#[derive(Debug)]
pub struct Summary {
    pub text: String,
    pub error: Option<ServiceError>,
}

impl Summary {
    fn failed(error: ServiceError) -> Self {
        let text = match error {
            ServiceError::MissingCredential(_) => UNAVAILABLE,
            _ => FAILED,
        };
        Self {
            text: text.to_string(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Summary;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

/// Chat-completions client producing short summaries.
pub struct OpenAiSummarizer {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiSummarizer {
    /// A missing or blank key is reported per request, not here.
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn request(&self, text: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ServiceError::MissingCredential("OPENAI_API_KEY"))?;
        if text.trim().is_empty() {
            return Err(ServiceError::EmptyInput);
        }

        let prompt = format!("Summarize the following text:\n\n{text}");
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api(format!("{status}: {}", detail.trim())));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| ServiceError::Api("response contained no choices".to_string()))
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, text: &str) -> Summary {
        match self.request(text).await {
            Ok(text) => Summary { text, error: None },
            Err(e) => {
                log::warn!("Summarization failed: {e}");
                Summary::failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    fn summarizer(url: &str, key: Option<&str>) -> OpenAiSummarizer {
        OpenAiSummarizer::new(key.map(String::from), Duration::from_secs(5))
            .unwrap()
            .with_base_url(url)
    }

    #[test]
    fn test_join_pages() {
        let pages = vec!["one".to_string(), "two".to_string()];
        assert_eq!(join_pages(&pages), "one\ntwo");
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let summary = summarizer("http://127.0.0.1:1", None).summarize("text").await;
        assert_eq!(summary.text, UNAVAILABLE);
        assert!(matches!(summary.error, Some(ServiceError::MissingCredential(_))));

        let summary = summarizer("http://127.0.0.1:1", Some("  ")).summarize("text").await;
        assert_eq!(summary.text, UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_summary_from_first_choice() {
        let (url, request) = serve_once(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"  Short version. "}}]}"#,
        )
        .await;

        let summary = summarizer(&url, Some("sk-test")).summarize("a long text").await;

        assert!(summary.is_ok());
        assert_eq!(summary.text, "Short version.");
        let request = request.await.unwrap();
        assert!(request.starts_with("POST /chat/completions"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(request.contains(r#""max_tokens":150"#));
        assert!(request.contains("Summarize the following text:\\n\\na long text"));
    }

    #[tokio::test]
    async fn test_api_error_is_failed() {
        let (url, _request) = serve_once(401, r#"{"error":{"message":"bad key"}}"#).await;
        let summary = summarizer(&url, Some("sk-bad")).summarize("text").await;
        assert_eq!(summary.text, FAILED);
        assert!(matches!(summary.error, Some(ServiceError::Api(_))));
    }

    #[tokio::test]
    async fn test_empty_choices_is_failed() {
        let (url, _request) = serve_once(200, r#"{"choices":[]}"#).await;
        let summary = summarizer(&url, Some("sk-test")).summarize("text").await;
        assert_eq!(summary.text, FAILED);
    }
}
