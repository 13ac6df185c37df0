//! quill-ai: chat-completion wire layer
//!
//! This crate provides the message types sent to a chat-completion endpoint,
//! the decoder for the event payloads it streams back, and the SSE transport
//! that carries them.

pub mod error;
pub mod sse;
pub mod transport;
pub mod types;

pub use error::{Error, Result, TransportError};
pub use sse::StreamPayload;
pub use transport::{ChatTransport, RetryConfig, SseTransport, TransportEvent, TransportStream};
pub use types::*;
