//! Runtime configuration.
//!
//! Loaded from TOML (explicit `--config` path, else the platform config
//! dir), then overridden by `VIVO_*` environment variables. Every section
//! has defaults, so an absent file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::conversation::cleaner::DEFAULT_FILLER_WORDS;
use crate::error::ConfigError;
use crate::supervisor::SupervisorSettings;
use crate::voice::{LanguageCode, LanguagePair};

const CONFIG_FILE_NAME: &str = "config.toml";
const SESSION_DB_NAME: &str = "sessions.db";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "vivo-fluent")
}

// ── Sections ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// ISO 639-1 code of the language being learned.
    pub to_learn_code: String,
    /// ISO 639-1 code of the language the user already speaks.
    pub known_code: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            to_learn_code: LanguageCode::De.as_str().to_string(),
            known_code: LanguageCode::En.as_str().to_string(),
        }
    }
}

impl LanguageConfig {
    pub fn pair(&self) -> Result<LanguagePair, ConfigError> {
        let parse = |code: &str| {
            LanguageCode::from_str_code(code)
                .ok_or_else(|| ConfigError::UnknownLanguage(code.to_string()))
        };
        Ok(LanguagePair {
            target: parse(&self.to_learn_code)?,
            known: parse(&self.known_code)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Inactivity window in minutes.
    pub timeout_minutes: u64,
    pub auto_reconnect: bool,
    pub reconnect_backoff_ms: u64,
    /// Wait for a final user transcript after speech ends.
    pub final_transcript_timeout_secs: u64,
    /// Stored session history cap.
    pub max_sessions: usize,
    /// Message count that ends a conversation.
    pub max_conversation_turns: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 5,
            auto_reconnect: true,
            reconnect_backoff_ms: 2_000,
            final_transcript_timeout_secs: 15,
            max_sessions: crate::session::manager::DEFAULT_MAX_SESSIONS,
            max_conversation_turns: crate::conversation::engine::DEFAULT_MAX_CONVERSATION_TURNS,
        }
    }
}

impl SessionConfig {
    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            inactivity_timeout: Duration::from_secs(self.timeout_minutes.max(1) * 60),
            auto_reconnect: self.auto_reconnect,
            reconnect_backoff: Duration::from_millis(self.reconnect_backoff_ms),
            final_transcript_timeout: Duration::from_secs(self.final_transcript_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Voice service credential.
    pub api_key: Option<String>,
    /// Pre-configured assistant on the service side.
    pub assistant_id: Option<String>,
    /// Overrides the per-language default voice.
    pub voice_id: Option<String>,
    pub voice_provider: String,
    pub model_provider: String,
    pub model: String,
    pub temperature: f32,
    pub transcriber_language: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            assistant_id: None,
            voice_id: None,
            voice_provider: "11labs".into(),
            model_provider: "openai".into(),
            model: "gpt-4".into(),
            temperature: 0.8,
            transcriber_language: "multi".into(),
        }
    }
}

impl VoiceConfig {
    /// The configured credential, or `MissingCredential` when unset/blank.
    pub fn require_credential(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingCredential)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    pub filler_words: Vec<String>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            filler_words: DEFAULT_FILLER_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `sqlite` or `memory`.
    pub backend: String,
    /// SQLite file; defaults to the platform data dir.
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".into(),
            path: None,
        }
    }
}

impl StorageConfig {
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        match project_dirs() {
            Some(dirs) => dirs.data_dir().join(SESSION_DB_NAME),
            None => PathBuf::from(SESSION_DB_NAME),
        }
    }
}

// ── Root ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub language: LanguageConfig,
    pub session: SessionConfig,
    pub voice: VoiceConfig,
    pub cleaner: CleanerConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load from `path`, or from the platform config dir when `None`, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.language.pair()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Apply `VIVO_*` overrides. Unparseable values are logged and skipped.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(code) = get("VIVO_LANGUAGE_TO_LEARN_CODE") {
            self.language.to_learn_code = code;
        }
        if let Some(code) = get("VIVO_LANGUAGE_KNOWN_CODE") {
            self.language.known_code = code;
        }
        if let Some(raw) = get("VIVO_SESSION_TIMEOUT_MINUTES") {
            match raw.parse::<u64>() {
                Ok(minutes) if minutes > 0 => self.session.timeout_minutes = minutes,
                _ => tracing::warn!(value = %raw, "Ignoring invalid VIVO_SESSION_TIMEOUT_MINUTES"),
            }
        }
        if let Some(raw) = get("VIVO_ENABLE_AUTO_RECONNECT") {
            match parse_bool(&raw) {
                Some(flag) => self.session.auto_reconnect = flag,
                None => tracing::warn!(value = %raw, "Ignoring invalid VIVO_ENABLE_AUTO_RECONNECT"),
            }
        }
        if let Some(id) = get("VIVO_VOICE_ID") {
            self.voice.voice_id = Some(id);
        }
        if let Some(key) = get("VIVO_VOICE_API_KEY") {
            self.voice.api_key = Some(key);
        }
        if let Some(id) = get("VIVO_ASSISTANT_ID") {
            self.voice.assistant_id = Some(id);
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
