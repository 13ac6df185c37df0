//! Session event types

use quill_ai::Message;
use serde::{Deserialize, Serialize};

/// Events emitted while a session runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The streaming indicator changed
    StreamingChanged { active: bool },

    /// A turn was added at the end of the conversation
    MessageAppended { message: Message },

    /// The trailing turn was removed (regenerate)
    MessageRemoved { message: Message },

    /// The in-progress reply has new content (the whole buffer so far)
    ReplyUpdated { index: usize, content: String },

    /// A retriable error occurred; the transport will reconnect
    Retrying {
        attempt: u32,
        max_retries: u32,
        error: String,
    },

    /// The conversation was emptied
    Cleared,

    /// The exchange is over
    ExchangeEnd { outcome: ExchangeOutcome },
}

/// How an exchange ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExchangeOutcome {
    /// `[DONE]` was received
    Completed,
    /// Stopped by the user
    Stopped,
    /// The endpoint sent `[ERROR]`; the text was appended as an assistant turn
    Reported { message: String },
    /// A fatal transport error, or the request could not be sent
    Failed { reason: String },
    /// Too many consecutive retriable errors
    RetriesExhausted { attempts: u32, last_error: String },
}

impl ExchangeOutcome {
    /// Whether the reply finished normally
    pub fn is_completed(&self) -> bool {
        matches!(self, ExchangeOutcome::Completed)
    }

    /// One-line description for status bars
    pub fn describe(&self) -> String {
        match self {
            ExchangeOutcome::Completed => "Ready".to_string(),
            ExchangeOutcome::Stopped => "Stopped".to_string(),
            ExchangeOutcome::Reported { .. } => "Error reported by server".to_string(),
            ExchangeOutcome::Failed { reason } => format!("Error: {}", reason),
            ExchangeOutcome::RetriesExhausted {
                attempts,
                last_error,
            } => format!("Gave up after {} attempts: {}", attempts, last_error),
        }
    }
}
