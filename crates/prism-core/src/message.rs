//! Conversation and output message types.
//!
//! `ConversationMessage` carries the shared input history that every ray
//! receives as its prompt prefix. `OutputMessage` is the accumulating output
//! of a single ray or fusion: an ordered sequence of content fragments that
//! is append-only while the owning job is active.

use serde::{Deserialize, Serialize};

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
    /// System-generated message.
    System,
}

/// A single message in the shared conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
    /// Timestamp when the message was created (RFC 3339 format).
    pub timestamp: String,
}

impl ConversationMessage {
    /// Creates a message stamped with the current time.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Creates a user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates an assistant message stamped with the current time.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// The accumulated output of one ray or fusion.
///
/// Fragments arrive as incremental deltas from the generation job and are
/// applied strictly in send order. Once the owning entity reaches a terminal
/// state the message is immutable until an explicit restart clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMessage {
    fragments: Vec<String>,
}

impl OutputMessage {
    /// Creates an empty output message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one content fragment.
    pub fn append(&mut self, fragment: impl Into<String>) {
        self.fragments.push(fragment.into());
    }

    /// Returns the full text, fragments joined in arrival order.
    pub fn text(&self) -> String {
        self.fragments.concat()
    }

    /// Returns true if no fragment has arrived yet.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Returns the number of fragments received so far.
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Discards all fragments. Only reachable through restart transitions.
    pub(crate) fn clear(&mut self) {
        self.fragments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_message_preserves_fragment_order() {
        let mut output = OutputMessage::new();
        output.append("Hello");
        output.append(", ");
        output.append("world");

        assert_eq!(output.text(), "Hello, world");
        assert_eq!(output.fragment_count(), 3);
        assert!(!output.is_empty());
    }

    #[test]
    fn test_conversation_message_timestamps() {
        let msg = ConversationMessage::user("compare these approaches");
        assert_eq!(msg.role, MessageRole::User);
        assert!(!msg.timestamp.is_empty());
    }
}
