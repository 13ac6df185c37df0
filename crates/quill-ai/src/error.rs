//! Error types for quill-ai

use thiserror::Error;

/// Result type alias using quill-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a chat-completion endpoint
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Event payload did not have the expected shape
    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A failure surfaced by the transport while an exchange is running.
///
/// Retriable failures are absorbed by the transport's reconnect loop (bounded
/// by the session's retry cap); fatal ones end the exchange immediately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{0}")]
    Retriable(String),

    #[error("{0}")]
    Fatal(String),
}

impl TransportError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, TransportError::Retriable(_))
    }

    /// Classify an event-source error.
    ///
    /// A bad handshake (status or content type), an unexpected close and
    /// network-level failures are retriable. Anything else is fatal.
    pub fn classify(error: &reqwest_eventsource::Error) -> Self {
        use reqwest_eventsource::Error as EsError;

        match error {
            EsError::InvalidStatusCode(status, _) => {
                TransportError::Retriable(format!("unexpected status {}", status))
            }
            EsError::InvalidContentType(content_type, _) => TransportError::Retriable(format!(
                "unexpected content type {}",
                content_type.to_str().unwrap_or("<binary>")
            )),
            EsError::StreamEnded => {
                TransportError::Retriable("stream closed unexpectedly".to_string())
            }
            EsError::Transport(e) => TransportError::Retriable(format!("transport: {}", e)),
            EsError::Utf8(e) => TransportError::Retriable(format!("invalid utf-8: {}", e)),
            EsError::Parser(e) => TransportError::Retriable(format!("malformed stream: {}", e)),
            other => TransportError::Fatal(other.to_string()),
        }
    }
}

impl From<Error> for TransportError {
    fn from(error: Error) -> Self {
        match error {
            Error::Sse(_) | Error::UnexpectedPayload(_) | Error::Json(_) => {
                TransportError::Retriable(error.to_string())
            }
            Error::InvalidConfig(_) => TransportError::Fatal(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_ended_is_retriable() {
        let e = TransportError::classify(&reqwest_eventsource::Error::StreamEnded);
        assert!(e.is_retriable());
        assert_eq!(
            e,
            TransportError::Retriable("stream closed unexpectedly".to_string())
        );
    }

    #[test]
    fn test_invalid_last_event_id_is_fatal() {
        let e = TransportError::classify(&reqwest_eventsource::Error::InvalidLastEventId(
            "bad\nid".to_string(),
        ));
        assert!(!e.is_retriable());
    }

    #[test]
    fn test_payload_errors_are_retriable() {
        let e: TransportError = Error::UnexpectedPayload("no choices".into()).into();
        assert!(e.is_retriable());
        assert!(e.to_string().contains("no choices"));
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let e: TransportError = Error::InvalidConfig("bad header".into()).into();
        assert_eq!(
            e,
            TransportError::Fatal("Invalid configuration: bad header".to_string())
        );
    }
}
