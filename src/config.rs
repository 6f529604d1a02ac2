//! Configuration types for the chatbot pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable consulted for the backend credential when the
/// config file leaves `llm.api_key` empty.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NivaConfig {
    /// Completion endpoint settings.
    pub server: ServerConfig,
    /// Generative-language backend settings.
    pub llm: LlmConfig,
    /// Conversation gate and session defaults.
    pub conversation: ConversationConfig,
    /// Periodic time/weather refresh.
    pub ambient: AmbientConfig,
    /// Speech input/output capabilities.
    pub speech: SpeechConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on. Use `0` to let the OS pick one.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3000,
        }
    }
}

/// Generative-language backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key for the backend. Empty means "look at [`API_KEY_ENV`]".
    pub api_key: String,
    /// Base URL of the generative-language API.
    pub base_url: String,
    /// Model name to request.
    pub model: String,
    /// Request timeout in seconds. `0` keeps the transport default.
    pub request_timeout_s: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_owned(),
            model: "gemini-pro".to_owned(),
            request_timeout_s: 0,
        }
    }
}

impl LlmConfig {
    /// Returns the credential to use, if any.
    ///
    /// A non-empty `api_key` in the config wins; otherwise the value of
    /// [`API_KEY_ENV`] is used when set and non-empty.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(std::env::var(API_KEY_ENV).ok())
    }

    fn resolve_api_key_with(&self, env_value: Option<String>) -> Option<String> {
        let configured = self.api_key.trim();
        if !configured.is_empty() {
            return Some(configured.to_owned());
        }
        env_value
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }
}

/// Conversation gate and session defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Wake phrase that must appear in a recognized utterance unless
    /// always-listening mode is on (case-insensitive).
    pub wake_phrase: String,
    /// Initial value of the always-listening flag.
    pub always_listening: bool,
    /// Initial value of the small-talk flag.
    pub small_talk: bool,
    /// Mood id selected at session start.
    pub default_mood: String,
    /// Delay before an accepted voice command is submitted, in milliseconds.
    pub command_delay_ms: u64,
    /// Assistant greeting seeded into every new conversation.
    pub greeting: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            wake_phrase: "hey niva".to_owned(),
            always_listening: false,
            small_talk: false,
            default_mood: "focused".to_owned(),
            command_delay_ms: 100,
            greeting: crate::session::DEFAULT_GREETING.to_owned(),
        }
    }
}

/// Ambient context refresh configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    /// Seconds between clock refreshes.
    pub time_refresh_s: u64,
    /// Seconds between weather refreshes.
    pub weather_refresh_s: u64,
    /// Fixed weather summary reported by the placeholder weather source.
    pub weather: String,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            time_refresh_s: 60,
            weather_refresh_s: 600,
            weather: "Sunny, 25°C".to_owned(),
        }
    }
}

/// Speech capability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether speech recognition input is enabled.
    pub recognition: bool,
    /// Whether replies are spoken aloud.
    pub synthesis: bool,
    /// Recognition locale and preferred voice locale.
    pub locale: String,
    /// Speaking rate (1.0 = normal).
    pub rate: f32,
    /// Voice pitch (1.0 = normal).
    pub pitch: f32,
    /// Output volume in `[0, 1]`.
    pub volume: f32,
    /// Explicit TTS program. `None` probes `PATH` for a known one.
    pub tts_program: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            recognition: true,
            synthesis: true,
            locale: "en-IN".to_owned(),
            rate: 0.9,
            pitch: 1.1,
            volume: 1.0,
            tts_program: None,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub filter: String,
    /// Directory for daily-rolling log files. `None` logs to stderr only.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "niva=info".to_owned(),
            directory: None,
        }
    }
}

impl NivaConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::NivaError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::NivaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `path` when given, else from [`Self::default_config_path`]
    /// if it exists, else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load(path: Option<&std::path::Path>) -> crate::error::Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default_path = Self::default_config_path();
                if default_path.is_file() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Returns the default config file path: `<config dir>/niva/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("niva").join("config.toml")
        } else if let Some(dir) = dirs::config_dir() {
            dir.join("niva").join("config.toml")
        } else {
            PathBuf::from("/tmp/niva-config/config.toml")
        }
    }
}
