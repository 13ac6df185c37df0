//! Conversation state: ordered turns and the in-progress reply.

use quill_ai::{Message, Role};

/// Names the assistant turn that is currently being streamed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnId(usize);

impl TurnId {
    /// Position of the turn in the conversation
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Ordered conversation turns, oldest first.
///
/// At most one assistant turn is in progress at a time, and while it is, it
/// is the last element.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    in_progress: Option<TurnId>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn at the end.
    ///
    /// Appending closes any reply that was in progress.
    pub fn append(&mut self, message: Message) {
        self.in_progress = None;
        self.messages.push(message);
    }

    /// Remove the last turn, returning it. No-op on an empty conversation.
    pub fn drop_last(&mut self) -> Option<Message> {
        self.in_progress = None;
        self.messages.pop()
    }

    /// The last `n` turns in original order (all of them if fewer exist).
    pub fn window(&self, n: usize) -> Vec<Message> {
        let start = self.messages.len().saturating_sub(n);
        self.messages[start..].to_vec()
    }

    /// Start a new, empty assistant turn at the end and return its id.
    ///
    /// If a reply is already in progress, its id is returned instead.
    pub fn begin_reply(&mut self) -> TurnId {
        if let Some(turn) = self.in_progress {
            return turn;
        }
        self.messages.push(Message::assistant(String::new()));
        let turn = TurnId(self.messages.len() - 1);
        self.in_progress = Some(turn);
        turn
    }

    /// Overwrite the content of the in-progress reply.
    ///
    /// Returns `false` when `turn` is no longer the reply in progress.
    pub fn update_reply(&mut self, turn: TurnId, content: &str) -> bool {
        if self.in_progress != Some(turn) {
            return false;
        }
        match self.messages.get_mut(turn.0) {
            Some(message) => {
                message.content.clear();
                message.content.push_str(content);
                true
            }
            None => false,
        }
    }

    /// Mark the in-progress reply (if any) as complete.
    pub fn finish_reply(&mut self) -> Option<TurnId> {
        self.in_progress.take()
    }

    /// The reply currently being streamed into
    pub fn in_progress(&self) -> Option<TurnId> {
        self.in_progress
    }

    /// Clear all turns
    pub fn clear(&mut self) {
        self.messages.clear();
        self.in_progress = None;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The most recent assistant turn
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self {
            messages,
            in_progress: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> Conversation {
        let mut conversation = Conversation::new();
        for i in 0..count {
            if i % 2 == 0 {
                conversation.append(Message::user(format!("u{}", i)));
            } else {
                conversation.append(Message::assistant(format!("a{}", i)));
            }
        }
        conversation
    }

    #[test]
    fn test_window_returns_trailing_turns_in_order() {
        let conversation = numbered(25);
        let window = conversation.window(20);
        assert_eq!(window.len(), 20);
        assert_eq!(window[0].content, "a5");
        assert_eq!(window[19].content, "u24");
    }

    #[test]
    fn test_window_shorter_than_n() {
        let conversation = numbered(3);
        assert_eq!(conversation.window(20), conversation.messages().to_vec());
        assert!(Conversation::new().window(20).is_empty());
        assert!(conversation.window(0).is_empty());
    }

    #[test]
    fn test_window_does_not_mutate() {
        let conversation = numbered(30);
        let _ = conversation.window(5);
        assert_eq!(conversation.len(), 30);
    }

    #[test]
    fn test_window_keeps_in_progress_reply_last() {
        let mut conversation = numbered(4);
        conversation.append(Message::user("next"));
        let turn = conversation.begin_reply();
        conversation.update_reply(turn, "partial");

        let window = conversation.window(2);
        assert_eq!(window[0], Message::user("next"));
        assert_eq!(window[1], Message::assistant("partial"));
    }

    #[test]
    fn test_drop_last() {
        let mut conversation = numbered(2);
        assert_eq!(conversation.drop_last(), Some(Message::assistant("a1")));
        assert_eq!(conversation.len(), 1);

        let mut empty = Conversation::new();
        assert_eq!(empty.drop_last(), None);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_reply_lifecycle() {
        let mut conversation = Conversation::new();
        conversation.append(Message::user("hi"));

        let turn = conversation.begin_reply();
        assert_eq!(turn.index(), 1);
        assert_eq!(conversation.begin_reply(), turn);

        assert!(conversation.update_reply(turn, "He"));
        assert!(conversation.update_reply(turn, "Hello"));
        assert_eq!(conversation.last(), Some(&Message::assistant("Hello")));

        assert_eq!(conversation.finish_reply(), Some(turn));
        assert!(!conversation.update_reply(turn, "late"));
        assert_eq!(conversation.last(), Some(&Message::assistant("Hello")));
    }

    #[test]
    fn test_append_closes_reply() {
        let mut conversation = Conversation::new();
        let turn = conversation.begin_reply();
        conversation.append(Message::assistant("error text"));
        assert_eq!(conversation.in_progress(), None);
        assert!(!conversation.update_reply(turn, "ignored"));
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_last_assistant() {
        let mut conversation = numbered(3);
        assert_eq!(conversation.last_assistant(), Some(&Message::assistant("a1")));
        conversation.clear();
        assert_eq!(conversation.last_assistant(), None);
    }
}
