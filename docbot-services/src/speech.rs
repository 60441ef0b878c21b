use std::process::Command;

use async_trait::async_trait;

use crate::error::{Result, ServiceError};

#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Speak `text` aloud, returning once playback ends.
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Drives a command-line TTS program such as `espeak -s <rate> <text>`.
pub struct CommandSpeech {
    program: String,
    rate: u32,
}

impl CommandSpeech {
    /// Run `program -s rate <text>` for each request.
    pub fn new(program: impl Into<String>, rate: u32) -> Self {
        Self {
            program: program.into(),
            rate,
        }
    }
}

#[async_trait]
impl SpeechEngine for CommandSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ServiceError::EmptyInput);
        }

        let program = self.program.clone();
        let rate = self.rate.to_string();
        let text = text.to_string();
        log::debug!("Speaking {} chars with {program}", text.len());

        // Playback blocks for the length of the audio
        let status = tokio::task::spawn_blocking(move || {
            Command::new(&program)
                .args(["-s", &rate])
                .arg(&text)
                .status()
                .map_err(|e| ServiceError::Process(format!("{program}: {e}")))
        })
        .await
        .map_err(|e| ServiceError::Process(e.to_string()))??;

        if !status.success() {
            return Err(ServiceError::Process(format!("{} exited with {status}", self.program)));
        }
        Ok(())
    }
}
