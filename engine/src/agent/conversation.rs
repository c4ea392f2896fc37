//! Conversation history of one run
//!
//! Unlike a chat session, an orchestration run never trims: the Brain must see
//! every tool result in order, and tool messages are only valid right after
//! the assistant turn that requested them.

use crate::llm::{Message, MessageRole};

/// Append-only message sequence owned by a single run
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation from its priming messages
    pub fn new(priming: Vec<Message>) -> Self {
        Self { messages: priming }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
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

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages with `role`
    pub fn count(&self, role: MessageRole) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_only_order() {
        let mut conversation =
            Conversation::new(vec![Message::system("sys"), Message::user("task")]);
        conversation.push(Message::assistant("thinking"));
        conversation.push(Message::tool_result("{}", "call_1"));

        assert_eq!(conversation.len(), 4);
        assert_eq!(conversation.messages()[0].role, MessageRole::System);
        assert_eq!(conversation.last().map(|m| m.role), Some(MessageRole::Tool));
        assert_eq!(conversation.count(MessageRole::Assistant), 1);
    }

    #[test]
    fn test_empty() {
        let conversation = Conversation::default();
        assert!(conversation.is_empty());
        assert!(conversation.last().is_none());
    }
}
