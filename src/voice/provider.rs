//! Outbound interface to the voice service.
//!
//! The connection wrapper around the vendor SDK lives outside this crate;
//! the runtime only needs the three calls in [`VoiceProvider`]. Inbound
//! events arrive separately on a channel of [`super::VoiceEvent`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ── Connect configuration ────────────────────────────────────────

/// Synthesis voice selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSettings {
    pub provider: String,
    pub voice_id: String,
}

/// Assistant model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
}

/// Everything the voice service needs to start a call.
///
/// Resolved once per connection attempt and remembered by the runtime so an
/// unexpected disconnect can be retried with the same values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectConfig {
    /// Display name of the assistant ("Dr. Schmidt - Head Nurse").
    pub name: String,
    /// System prompt, including any previous-conversation context.
    pub system_prompt: String,
    /// Line the assistant speaks first.
    pub first_message: String,
    pub voice: VoiceSettings,
    pub model: ModelSettings,
    /// Recognition language hint (`"multi"` lets the service auto-detect).
    pub transcriber_language: String,
    /// Pre-configured assistant on the service side; when set, the service
    /// ignores the inline prompt/voice/model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
}

// ── Provider trait ───────────────────────────────────────────────

/// Voice service connection.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Start a call with the given configuration.
    async fn connect(&self, config: &ConnectConfig) -> anyhow::Result<()>;

    /// End the current call.
    async fn disconnect(&self) -> anyhow::Result<()>;

    /// Send a typed user message into the call.
    async fn send_text(&self, text: &str) -> anyhow::Result<()>;

    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Whether `connect` needs the voice service API key.
    fn requires_credential(&self) -> bool {
        true
    }
}

// ── Recording provider ───────────────────────────────────────────

/// An outbound call made to a [`RecordingProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Connect(ConnectConfig),
    Disconnect,
    SendText(String),
}

/// Provider that performs no I/O and records every call.
///
/// Used by `vivo-fluent replay`, where inbound events come from a script
/// rather than a live service, and by tests.
#[derive(Default)]
pub struct RecordingProvider {
    calls: Mutex<Vec<ProviderCall>>,
    fail_connect: bool,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose `connect` always fails.
    pub fn failing_connect() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_connect: true,
        }
    }

    /// Snapshot of the calls made so far.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    /// Number of `connect` calls made so far.
    pub fn connect_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ProviderCall::Connect(_)))
            .count()
    }
}

#[async_trait]
impl VoiceProvider for RecordingProvider {
    async fn connect(&self, config: &ConnectConfig) -> anyhow::Result<()> {
        self.calls.lock().push(ProviderCall::Connect(config.clone()));
        if self.fail_connect {
            anyhow::bail!("Failed to start voice conversation");
        }
        tracing::debug!(assistant = %config.name, "Recording provider connect");
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.calls.lock().push(ProviderCall::Disconnect);
        Ok(())
    }

    async fn send_text(&self, text: &str) -> anyhow::Result<()> {
        self.calls.lock().push(ProviderCall::SendText(text.to_string()));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }

    fn requires_credential(&self) -> bool {
        false
    }
}
