//! One request/reply cycle, started from any front end

use quill_chat::{ChatSession, ExchangeOutcome, UserInput};

/// What to ask the session for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// Send a new user turn
    Submit(UserInput),
    /// Re-ask for the latest reply
    Regenerate,
}

impl Exchange {
    /// Run the exchange to its end.
    ///
    /// `Ok(None)` means nothing was sent (regenerate on an empty
    /// conversation).
    pub async fn run(self, session: &mut ChatSession) -> quill_chat::Result<Option<ExchangeOutcome>> {
        match self {
            Exchange::Submit(input) => session.submit(input).await.map(Some),
            Exchange::Regenerate => Ok(session.regenerate().await),
        }
    }
}
