//! Streaming transcript accumulation.
//!
//! The voice service sends the *full transcript so far* with every partial
//! update, not a delta. The accumulator therefore replaces its buffer on each
//! partial and only hands out an [`Utterance`] when the speaker's turn is
//! final: a final transcript, or (for the assistant) the end of speech.
//!
//! Gating of user speech is not done here; the engine only feeds user
//! events in while the listening gate is open.

use super::Role;

/// A finalized, not yet cleaned, utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub role: Role,
    pub text: String,
}

impl Utterance {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Per-speaker transcript buffers.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    /// Latest assistant partial.
    assistant_buffer: String,
    /// Set while an assistant turn is streaming.
    accumulating_assistant: bool,
    /// Latest user partial, shown live but never recorded on its own.
    user_partial: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Assistant ────────────────────────────────────────────────

    /// Replace the assistant buffer with a new partial. Empty partials are
    /// ignored. Returns `true` when this partial started a new turn.
    pub fn assistant_partial(&mut self, transcript: &str) -> bool {
        if transcript.trim().is_empty() {
            return false;
        }
        let started = !self.accumulating_assistant;
        self.assistant_buffer.clear();
        self.assistant_buffer.push_str(transcript);
        self.accumulating_assistant = true;
        started
    }

    /// Finish the assistant turn. A non-empty `transcript` wins; an empty
    /// final frame falls back to the last buffered partial.
    pub fn assistant_final(&mut self, transcript: &str) -> Option<Utterance> {
        let text = if transcript.trim().is_empty() {
            std::mem::take(&mut self.assistant_buffer)
        } else {
            transcript.to_string()
        };
        self.assistant_buffer.clear();
        self.accumulating_assistant = false;

        if text.trim().is_empty() {
            None
        } else {
            Some(Utterance::new(Role::Assistant, text))
        }
    }

    /// Force out a buffered assistant turn when speech ends before the
    /// final frame arrives.
    pub fn flush_assistant(&mut self) -> Option<Utterance> {
        if !self.accumulating_assistant {
            return None;
        }
        self.accumulating_assistant = false;
        let text = std::mem::take(&mut self.assistant_buffer);
        if text.trim().is_empty() {
            None
        } else {
            tracing::debug!(chars = text.len(), "Flushing assistant buffer on speech end");
            Some(Utterance::new(Role::Assistant, text))
        }
    }

    pub fn is_accumulating_assistant(&self) -> bool {
        self.accumulating_assistant
    }

    #[cfg(test)]
    fn assistant_text(&self) -> &str {
        &self.assistant_buffer
    }

    // ── User ─────────────────────────────────────────────────────

    /// Record a user partial for live display. Returns `false` for empty
    /// partials.
    pub fn user_partial(&mut self, transcript: &str) -> bool {
        if transcript.trim().is_empty() {
            return false;
        }
        self.user_partial.clear();
        self.user_partial.push_str(transcript);
        true
    }

    /// Finish the user turn with a final transcript.
    pub fn user_final(&mut self, transcript: &str) -> Option<Utterance> {
        self.user_partial.clear();
        if transcript.trim().is_empty() {
            None
        } else {
            Some(Utterance::new(Role::User, transcript))
        }
    }

    #[cfg(test)]
    fn user_partial_text(&self) -> &str {
        &self.user_partial
    }

    /// Clear the live user partial without producing an utterance.
    pub fn clear_user(&mut self) {
        self.user_partial.clear();
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Drop all buffered text without emitting anything.
    pub fn discard(&mut self) {
        if self.accumulating_assistant || !self.user_partial.is_empty() {
            tracing::debug!(
                assistant_chars = self.assistant_buffer.len(),
                user_chars = self.user_partial.len(),
                "Discarding buffered transcripts"
            );
        }
        self.assistant_buffer.clear();
        self.accumulating_assistant = false;
        self.user_partial.clear();
    }
}

// ── Tests ──────────────────────────────────────────────────────────
