//! Core types for chat-completion requests

use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name of this role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Sampling parameters sent with every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Model identifier understood by the endpoint
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0)
    pub temperature: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    /// Nucleus sampling cutoff
    pub top_p: f64,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: "gpt-4-all".to_string(),
            max_tokens: 800,
            temperature: 0.7,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            top_p: 0.95,
        }
    }
}

/// Request body for a streaming chat completion
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    #[serde(flatten)]
    pub params: CompletionParams,
    pub stream: bool,
    pub messages: Vec<Message>,
}

impl ChatRequest {
    /// Build a streaming request carrying `messages` as context
    pub fn streaming(params: &CompletionParams, messages: Vec<Message>) -> Self {
        Self {
            params: params.clone(),
            stream: true,
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_shape() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));

        let parsed: Message =
            serde_json::from_str(r#"{"role":"assistant","content":"Hello"}"#).unwrap();
        assert_eq!(parsed, Message::assistant("Hello"));
    }

    #[test]
    fn test_request_flattens_params() {
        let params = CompletionParams::default();
        let request = ChatRequest::streaming(&params, vec![Message::user("hi")]);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4-all");
        assert_eq!(json["max_tokens"], 800);
        assert_eq!(json["top_p"], 0.95);
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert!(json.get("params").is_none());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }
}
