//! Transcript reconciliation: from a noisy stream of partial/final speech
//! events to a clean, ordered, deduplicated message history.
//!
//! ```text
//! VoiceEvent ─▸ TranscriptAccumulator ─▸ MessageCleaner ─▸ ConversationHistory (gate)
//!                    ▲                                              │
//!                    │ listening gate                               ▼
//!               TurnMachine                                 ObjectiveEvaluator
//! ```
//!
//! [`engine::ConversationEngine`] wires these together as a reducer: each
//! event or command mutates the engine and returns a list of
//! [`engine::Effect`]s for the runtime to carry out.

pub mod accumulator;
pub mod cleaner;
pub mod engine;
pub mod feedback;
pub mod history;
pub mod turn;

use serde::{Deserialize, Serialize};

/// Speaker of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A recorded conversation message. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_epoch_ms(),
        }
    }
}

/// Current time in epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub use accumulator::{TranscriptAccumulator, Utterance};
pub use cleaner::MessageCleaner;
pub use engine::{Command, CompletionReason, ConversationEngine, Effect, Notice, NoticeLevel};
pub use feedback::{FeedbackHistory, FeedbackItem, ResponseSuggestion};
pub use history::ConversationHistory;
pub use turn::{ConnectionStatus, ListeningState, Speaker, TurnMachine};
