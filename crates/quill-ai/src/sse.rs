//! Decoding of streamed event payloads

use serde::Deserialize;

use crate::error::{Error, Result};

/// Marks the successful end of a reply
pub const DONE_SENTINEL: &str = "[DONE]";

/// Prefix of an upstream-reported failure; the rest is the error text
pub const ERROR_SENTINEL: &str = "[ERROR]";

/// The meaning of a single event's `data` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPayload {
    /// `[DONE]`
    Done,
    /// `[ERROR]<text>`, carrying the text with leading whitespace removed
    Error(String),
    /// An incremental chunk; `None` when the chunk carries no token text
    Delta(Option<String>),
}

/// Decode the `data` field of one event.
pub fn parse_payload(data: &str) -> Result<StreamPayload> {
    if data == DONE_SENTINEL {
        return Ok(StreamPayload::Done);
    }
    if let Some(rest) = data.strip_prefix(ERROR_SENTINEL) {
        return Ok(StreamPayload::Error(rest.trim_start().to_string()));
    }

    let chunk: StreamChunk = serde_json::from_str(data)?;
    let choice = chunk
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::UnexpectedPayload("chunk has no choices".to_string()))?;

    Ok(StreamPayload::Delta(
        choice.delta.and_then(|d| d.content).filter(|c| !c.is_empty()),
    ))
}

// Streaming response types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_sentinel() {
        assert_eq!(parse_payload("[DONE]").unwrap(), StreamPayload::Done);
    }

    #[test]
    fn test_done_must_match_exactly() {
        // Anything other than the bare sentinel goes through the JSON path
        assert!(parse_payload("[DONE] ").is_err());
    }

    #[test]
    fn test_error_sentinel_strips_prefix() {
        assert_eq!(
            parse_payload("[ERROR] rate limited").unwrap(),
            StreamPayload::Error("rate limited".to_string())
        );
        assert_eq!(
            parse_payload("[ERROR]").unwrap(),
            StreamPayload::Error(String::new())
        );
    }

    #[test]
    fn test_delta_with_content() {
        let payload = parse_payload(r#"{"choices":[{"delta":{"content":"He"}}]}"#).unwrap();
        assert_eq!(payload, StreamPayload::Delta(Some("He".to_string())));
    }

    #[test]
    fn test_delta_without_content() {
        let payload =
            parse_payload(r#"{"choices":[{"delta":{"role":"assistant"},"index":0}]}"#).unwrap();
        assert_eq!(payload, StreamPayload::Delta(None));

        let payload = parse_payload(r#"{"choices":[{"delta":{"content":""}}]}"#).unwrap();
        assert_eq!(payload, StreamPayload::Delta(None));
    }

    #[test]
    fn test_chunk_without_choices_is_rejected() {
        let err = parse_payload(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, Error::UnexpectedPayload(_)));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let err = parse_payload("not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
