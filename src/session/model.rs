use serde::{Deserialize, Serialize};

use crate::conversation::{Message, Role};
use crate::objectives::Objective;

/// Persisted record of one scenario conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    pub id: String,
    pub scenario_id: String,
    pub scenario_title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub objectives: Vec<Objective>,
    /// Epoch milliseconds.
    pub started_at: i64,
    /// Epoch milliseconds.
    pub last_updated: i64,
    /// Number of user messages.
    #[serde(default)]
    pub turn_count: usize,
    #[serde(default)]
    pub is_complete: bool,
}

impl ConversationSession {
    /// Recompute `turn_count` from `messages`.
    pub(crate) fn recount_turns(&mut self) {
        self.turn_count = self
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .count();
    }

    pub fn stats(&self) -> SessionStats {
        let user_messages = self.messages.iter().filter(|m| m.role == Role::User).count();
        let assistant_messages = self
            .messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();
        SessionStats {
            user_messages,
            assistant_messages,
            total_messages: self.messages.len(),
            completed_objectives: self.objectives.iter().filter(|o| o.completed).count(),
            total_objectives: self.objectives.len(),
            duration: format_duration(self.last_updated - self.started_at),
        }
    }
}

/// Partial update merged into the current session.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub messages: Option<Vec<Message>>,
    pub objectives: Option<Vec<Objective>>,
    pub is_complete: Option<bool>,
}

/// Summary figures for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub total_messages: usize,
    pub completed_objectives: usize,
    pub total_objectives: usize,
    /// Formatted as `"{m}m {s}s"` or `"{s}s"`.
    pub duration: String,
}

/// Format a millisecond span as `"3m 7s"`, or `"42s"` under a minute.
pub fn format_duration(millis: i64) -> String {
    let millis = millis.max(0);
    let minutes = millis / 60_000;
    let seconds = (millis % 60_000) / 1_000;
    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
