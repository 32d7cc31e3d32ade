use std::path::PathBuf;

/// Configuration problems surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`crate::config::Config`].
    #[error("failed to parse config file '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A language code outside the supported set.
    #[error("unknown language code '{0}'")]
    UnknownLanguage(String),

    /// No voice service credential configured; no connection is attempted.
    #[error("voice service API key is not configured (set VIVO_VOICE_API_KEY or voice.api_key)")]
    MissingCredential,
}
