//! Error types for quill-chat

use thiserror::Error;

/// Result type alias using quill-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during session operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the wire layer
    #[error(transparent)]
    Ai(#[from] quill_ai::Error),

    /// Neither text nor an attachment was given
    #[error("Please enter a message")]
    EmptyMessage,

    /// An exchange is already in flight
    #[error("A reply is still streaming")]
    Busy,

    /// Local files cannot be uploaded; attach a hosted URL instead
    #[error("Uploading {0} is not supported; attach a URL instead")]
    UploadUnavailable(String),
}

impl Error {
    /// Whether the error is about the user's input rather than the exchange
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyMessage | Error::Busy | Error::UploadUnavailable(_)
        )
    }
}
