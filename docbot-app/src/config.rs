//! Layered configuration: defaults, then an optional TOML file, then
//! environment overrides.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use docbot_collab::{CollabConfig, RelayConfig};
use docbot_services::ServicesConfig;

/// Read by the binaries' `--config` flag.
pub const ENV_CONFIG: &str = "DOCBOT_CONFIG";
pub const ENV_RELAY_URL: &str = "DOCBOT_RELAY_URL";
pub const ENV_USER: &str = "DOCBOT_USER";
pub const ENV_TRANSLATE_URL: &str = "DOCBOT_TRANSLATE_URL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Name used for annotations and chat until changed in-session
    pub username: Option<String>,
    /// ANSI colours and highlight markers in the terminal
    pub color: bool,
    /// Uploads above this size are refused
    pub max_document_bytes: u64,
    pub collab: CollabConfig,
    pub relay: RelayConfig,
    pub services: ServicesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            username: None,
            color: true,
            max_document_bytes: 50 * 1024 * 1024,
            collab: CollabConfig::default(),
            relay: RelayConfig::default(),
            services: ServicesConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid by `path` (if any), overlaid by the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Apply overrides from `lookup`; blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_RELAY_URL) {
            self.collab.relay_url = url;
        }
        if let Some(user) = get(ENV_USER) {
            self.username = Some(user.trim().to_string());
        }
        if let Some(url) = get(ENV_TRANSLATE_URL) {
            self.services.translate_url = url;
        }
        if let Some(key) = get(ENV_OPENAI_API_KEY) {
            self.services.openai_api_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.collab.relay_url, "ws://127.0.0.1:6789");
        assert_eq!(config.max_document_bytes, 50 * 1024 * 1024);
        assert!(config.username.is_none());
        assert!(config.color);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
username = "dana"
color = false

[collab]
relay_url = "ws://relay.internal:9000"

[collab.reconnect]
max_attempts = 5

[services]
speech_rate = 180
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.username.as_deref(), Some("dana"));
        assert!(!config.color);
        assert_eq!(config.collab.relay_url, "ws://relay.internal:9000");
        assert_eq!(config.collab.reconnect.max_attempts, Some(5));
        assert_eq!(config.collab.reconnect.initial_delay_ms, 500);
        assert_eq!(config.services.speech_rate, 180);
        assert_eq!(config.relay, RelayConfig::default());
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "color = \"sometimes\"").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));

        assert!(AppConfig::from_file(Path::new("/nonexistent/docbot.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            (ENV_RELAY_URL, "ws://example:1234"),
            (ENV_USER, "  erin "),
            (ENV_TRANSLATE_URL, "http://translate:5000"),
            (ENV_OPENAI_API_KEY, "sk-test"),
        ]));

        assert_eq!(config.collab.relay_url, "ws://example:1234");
        assert_eq!(config.username.as_deref(), Some("erin"));
        assert_eq!(config.services.translate_url, "http://translate:5000");
        assert_eq!(config.services.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[(ENV_RELAY_URL, "   "), (ENV_USER, "")]));
        assert_eq!(config.collab.relay_url, "ws://127.0.0.1:6789");
        assert!(config.username.is_none());
    }
}
