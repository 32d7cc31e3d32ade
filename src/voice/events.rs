//! JSON wire schema for messages arriving from the voice service.
//!
//! The voice SDK delivers call lifecycle, speech lifecycle, and transcript
//! messages as JSON objects tagged by `type`. They are decoded into
//! [`ProviderMessage`] and then mapped to the engine's [`VoiceEvent`].
//!
//! ```text
//! Voice service ──JSON──▸ ProviderMessage ──into_event()──▸ VoiceEvent ──▸ engine
//! ```
//!
//! Streaming recognition is noisy: unknown message types and malformed
//! payloads are dropped rather than treated as errors.

use serde::{Deserialize, Serialize};

use super::VoiceEvent;
use crate::conversation::Role;

// ── Voice service → client messages ───────────────────────────────

/// Messages received from the voice service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderMessage {
    /// The call has started.
    #[serde(rename = "call-start")]
    CallStart,

    /// The call has ended.
    #[serde(rename = "call-end")]
    CallEnd,

    /// Speech detected.
    #[serde(rename = "speech-start")]
    SpeechStart,

    /// Speech ended.
    #[serde(rename = "speech-end")]
    SpeechEnd,

    /// Transcript update for either speaker.
    #[serde(rename = "transcript")]
    Transcript {
        role: Role,
        /// Partial or final.
        #[serde(rename = "transcriptType")]
        transcript_type: TranscriptType,
        /// Full transcript so far (not a delta).
        #[serde(default)]
        transcript: String,
    },

    /// Error reported by the service.
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

/// Finality of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptType {
    Partial,
    Final,
}

impl ProviderMessage {
    /// Decode one JSON message. Returns `None` for malformed or unknown
    /// payloads.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping unrecognised voice service message");
                None
            }
        }
    }

    /// Map the wire message to the engine's event type.
    pub fn into_event(self) -> VoiceEvent {
        match self {
            Self::CallStart => VoiceEvent::Connected,
            Self::CallEnd => VoiceEvent::Disconnected,
            Self::SpeechStart => VoiceEvent::SpeechStarted,
            Self::SpeechEnd => VoiceEvent::SpeechEnded,
            Self::Transcript {
                role,
                transcript_type,
                transcript,
            } => match (role, transcript_type) {
                (Role::Assistant, TranscriptType::Partial) => {
                    VoiceEvent::PartialAssistant { transcript }
                }
                (Role::Assistant, TranscriptType::Final) => {
                    VoiceEvent::FinalAssistant { transcript }
                }
                (Role::User, TranscriptType::Partial) => VoiceEvent::PartialUser { transcript },
                (Role::User, TranscriptType::Final) => VoiceEvent::FinalUser { transcript },
            },
            Self::Error { message } => VoiceEvent::Error {
                message: message
                    .unwrap_or_else(|| "An error occurred with voice service".to_string()),
            },
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_user_transcript_maps_to_final_user() {
        let raw = r#"{"type":"transcript","role":"user","transcriptType":"final","transcript":"Ich bin neu"}"#;
        let event = ProviderMessage::parse(raw).unwrap().into_event();
        assert_eq!(
            event,
            VoiceEvent::FinalUser {
                transcript: "Ich bin neu".into()
            }
        );
    }

    #[test]
    fn partial_assistant_transcript() {
        let raw = r#"{"type":"transcript","role":"assistant","transcriptType":"partial","transcript":"Guten"}"#;
        match ProviderMessage::parse(raw).unwrap().into_event() {
            VoiceEvent::PartialAssistant { transcript } => assert_eq!(transcript, "Guten"),
            other => panic!("Wrong event: {other:?}"),
        }
    }

    #[test]
    fn final_frame_without_text_is_accepted() {
        let raw = r#"{"type":"transcript","role":"assistant","transcriptType":"final"}"#;
        assert_eq!(
            ProviderMessage::parse(raw).unwrap().into_event(),
            VoiceEvent::FinalAssistant {
                transcript: String::new()
            }
        );
    }

    #[test]
    fn lifecycle_messages() {
        assert_eq!(
            ProviderMessage::parse(r#"{"type":"call-start"}"#)
                .unwrap()
                .into_event(),
            VoiceEvent::Connected
        );
        assert_eq!(
            ProviderMessage::parse(r#"{"type":"speech-end"}"#)
                .unwrap()
                .into_event(),
            VoiceEvent::SpeechEnded
        );
    }

    #[test]
    fn error_without_message_gets_default_text() {
        let event = ProviderMessage::parse(r#"{"type":"error"}"#)
            .unwrap()
            .into_event();
        match event {
            VoiceEvent::Error { message } => assert!(message.contains("voice service")),
            other => panic!("Wrong event: {other:?}"),
        }
    }

    #[test]
    fn malformed_and_unknown_messages_are_dropped() {
        assert!(ProviderMessage::parse("not json").is_none());
        assert!(ProviderMessage::parse(r#"{"type":"volume-level","volume":0.3}"#).is_none());
        assert!(ProviderMessage::parse(r#"{"type":"transcript","role":"system"}"#).is_none());
    }
}
