//! Configuration file support

use quill_ai::CompletionParams;
use quill_chat::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Endpoint used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api/chat/completions";

/// Configuration for quill
///
/// Every field is optional; unset fields fall back to built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat-completion endpoint
    pub api_url: Option<String>,
    /// Bearer key (alternative to QUILL_API_KEY)
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub top_p: Option<f64>,
    /// Number of trailing turns sent as context
    pub history_window: Option<usize>,
    /// Consecutive stream errors tolerated per reply
    pub max_retries: Option<u32>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    /// Color theme (dark, light)
    pub theme: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quill")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("QUILL_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location, warning on a broken file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}", e);
                Self::default()
            }
        }
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))
    }

    /// Write the commented example config if no file exists yet
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }

    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// API key from the config, falling back to QUILL_API_KEY
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("QUILL_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }

    /// Sampling parameters with defaults filled in
    pub fn completion_params(&self) -> CompletionParams {
        let defaults = CompletionParams::default();
        CompletionParams {
            model: self.model.clone().unwrap_or(defaults.model),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            frequency_penalty: self.frequency_penalty.unwrap_or(defaults.frequency_penalty),
            presence_penalty: self.presence_penalty.unwrap_or(defaults.presence_penalty),
            top_p: self.top_p.unwrap_or(defaults.top_p),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            params: self.completion_params(),
            history_window: self.history_window.unwrap_or(defaults.history_window),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries).max(1),
        }
    }

    /// Overlay `other` on top of this config; set fields in `other` win
    pub fn merge(self, other: Config) -> Config {
        Config {
            api_url: other.api_url.or(self.api_url),
            api_key: other.api_key.or(self.api_key),
            model: other.model.or(self.model),
            max_tokens: other.max_tokens.or(self.max_tokens),
            temperature: other.temperature.or(self.temperature),
            frequency_penalty: other.frequency_penalty.or(self.frequency_penalty),
            presence_penalty: other.presence_penalty.or(self.presence_penalty),
            top_p: other.top_p.or(self.top_p),
            history_window: other.history_window.or(self.history_window),
            max_retries: other.max_retries.or(self.max_retries),
            tui: other.tui.or(self.tui),
            theme: other.theme.or(self.theme),
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# quill configuration file
# Place at ~/.config/quill/config.toml (Linux) or set QUILL_CONFIG_PATH

# Chat-completion endpoint (must stream text/event-stream)
api_url = "http://localhost:3000/api/chat/completions"

# Bearer key sent as the Authorization header (optional)
# Prefer the QUILL_API_KEY environment variable
# api_key = "sk-..."

# Sampling parameters
model = "gpt-4-all"
max_tokens = 800
temperature = 0.7
frequency_penalty = 0.0
presence_penalty = 0.0
top_p = 0.95

# Number of most recent turns sent as context
history_window = 20

# Consecutive stream errors tolerated before a reply is abandoned
max_retries = 3

# Whether to use TUI mode by default
# Set to false for simple stdin/stdout mode
tui = true

# Color theme (dark, light)
theme = "dark"
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.api_url.as_deref(), Some(DEFAULT_API_URL));
        assert_eq!(config.api_key, None);
        assert_eq!(config.history_window, Some(20));
        assert_eq!(config.completion_params(), CompletionParams::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("model = \"gpt-4o\"\ntemperature = 0.2\n").unwrap();
        let params = config.completion_params();
        assert_eq!(params.model, "gpt-4o");
        assert_eq!(params.temperature, 0.2);
        assert_eq!(params.max_tokens, 800);

        let session = config.session_config();
        assert_eq!(session.history_window, 20);
        assert_eq!(session.max_retries, 3);
        assert_eq!(config.api_url(), DEFAULT_API_URL);
    }

    #[test]
    fn test_zero_retries_is_raised_to_one() {
        let config = Config {
            max_retries: Some(0),
            ..Default::default()
        };
        assert_eq!(config.session_config().max_retries, 1);
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let file = Config {
            model: Some("from-file".into()),
            max_tokens: Some(100),
            tui: Some(false),
            ..Default::default()
        };
        let flags = Config {
            model: Some("from-flag".into()),
            ..Default::default()
        };

        let merged = file.merge(flags);
        assert_eq!(merged.model.as_deref(), Some("from-flag"));
        assert_eq!(merged.max_tokens, Some(100));
        assert_eq!(merged.tui, Some(false));
    }

    #[test]
    fn test_load_round_trips_serialized_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            api_url: Some("http://example.test/chat".into()),
            history_window: Some(8),
            ..Default::default()
        };

        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_tokens = \"many\"").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
