//! Voice service boundary for vivo-fluent.
//!
//! The voice AI service (speech-to-text, text-to-speech, the assistant model)
//! is an external collaborator. This module defines what crosses that
//! boundary:
//!
//! - [`VoiceEvent`]: the typed inbound event stream consumed by the engine
//! - [`events::ProviderMessage`]: the JSON wire format those events arrive in
//! - [`provider::VoiceProvider`]: the outbound calls (`connect`, `disconnect`,
//!   `send_text`)
//! - [`language`]: language pair, greetings, voice ids, and prompt adaptation

pub mod events;
pub mod language;
pub mod provider;

// ── Inbound voice event ──────────────────────────────────────────

/// Provider-agnostic event produced by the voice service.
///
/// Each variant carries only the fields relevant to it, so the engine can
/// dispatch with an exhaustive `match` instead of probing optional fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    /// The call is established.
    Connected,
    /// The call closed (for any reason).
    Disconnected,
    /// The service detected the start of speech.
    SpeechStarted,
    /// The service detected the end of speech.
    SpeechEnded,
    /// Growing, not-yet-final assistant transcript (full text so far).
    PartialAssistant { transcript: String },
    /// Final assistant transcript. May be empty when the service only marks
    /// the end of the utterance.
    FinalAssistant { transcript: String },
    /// Growing, not-yet-final user transcript.
    PartialUser { transcript: String },
    /// Final user transcript.
    FinalUser { transcript: String },
    /// Error reported by the service.
    Error { message: String },
}

impl VoiceEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::SpeechStarted => "speech-started",
            Self::SpeechEnded => "speech-ended",
            Self::PartialAssistant { .. } => "partial-assistant",
            Self::FinalAssistant { .. } => "final-assistant",
            Self::PartialUser { .. } => "partial-user",
            Self::FinalUser { .. } => "final-user",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event counts as conversational activity for the
    /// inactivity supervisor.
    pub fn is_activity(&self) -> bool {
        !matches!(
            self,
            Self::Connected | Self::Disconnected | Self::Error { .. }
        )
    }
}

pub use events::ProviderMessage;
pub use language::{LanguageCode, LanguagePair};
pub use provider::{
    ConnectConfig, ModelSettings, ProviderCall, RecordingProvider, VoiceProvider, VoiceSettings,
};
