//! Append-only message history with the same-role dedup gate.

use super::{Message, Role};

/// Ordered conversation messages.
///
/// A message is appended only when its cleaned content differs from the
/// most recent message of the same role. One slot per role: a user message
/// identical to an older (not most recent) user message is still accepted.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append cleaned content for `role`. Returns the recorded message, or
    /// `None` when the content is empty or repeats the role's last message.
    pub fn append(&mut self, role: Role, content: &str) -> Option<Message> {
        if content.trim().is_empty() {
            return None;
        }
        if self
            .last_of(role)
            .is_some_and(|last| last.content == content)
        {
            tracing::debug!(role = role.as_str(), "Skipping duplicate message");
            return None;
        }
        let message = Message::new(role, content);
        self.messages.push(message.clone());
        Some(message)
    }

    /// Most recent message spoken by `role`.
    pub fn last_of(&self, role: Role) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Replace the history with previously persisted messages.
    pub fn restore(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// All message contents joined with spaces.
    pub fn concatenated_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
