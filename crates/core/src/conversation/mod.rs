use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waymark_provider::{Message, Role};

/// Ordered message history for one chat session. The thread never contains
/// a system message; the active phase's instruction text is attached per
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub created_at: DateTime<Utc>,
    messages: Vec<Message>,
}

impl Thread {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Remove and return the most recent message. Used to roll back the
    /// pending user turn when a call fails.
    pub fn pop_message(&mut self) -> Option<Message> {
        self.messages.pop()
    }

    /// Replace the whole history with a single message. Used at the
    /// diagnostic-to-materials handover, where the new phase starts from
    /// the report alone.
    pub fn reseed(&mut self, message: Message) {
        self.messages.clear();
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}
