//! quill-chat: conversation state and the streaming session controller
//!
//! This crate owns the conversation, computes the history window sent
//! upstream, and folds streamed tokens into the trailing assistant turn.

pub mod attachment;
pub mod conversation;
pub mod error;
pub mod events;
pub mod handle;
pub mod session;

pub use attachment::{Attachment, UploadStub, UserInput, is_hosted};
pub use conversation::{Conversation, TurnId};
pub use error::{Error, Result};
pub use events::{ExchangeOutcome, SessionEvent};
pub use handle::SessionHandle;
pub use session::{ChatSession, SessionConfig};
