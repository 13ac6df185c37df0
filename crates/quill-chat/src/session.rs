//! The streaming session controller

use futures::StreamExt;
use quill_ai::{
    ChatRequest, ChatTransport, CompletionParams, Message, StreamPayload, TransportError,
    TransportEvent, TransportStream, sse,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    attachment::UserInput,
    conversation::{Conversation, TurnId},
    error::{Error, Result},
    events::{ExchangeOutcome, SessionEvent},
    handle::SessionHandle,
};

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sampling parameters sent with every request
    pub params: CompletionParams,
    /// Number of trailing turns sent upstream as context
    pub history_window: usize,
    /// Consecutive retriable errors tolerated before giving up
    pub max_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            params: CompletionParams::default(),
            history_window: 20,
            max_retries: 3,
        }
    }
}

/// Owns the conversation and drives one exchange at a time.
pub struct ChatSession {
    config: SessionConfig,
    conversation: Conversation,
    transport: Arc<dyn ChatTransport>,
    event_tx: broadcast::Sender<SessionEvent>,
    handle: SessionHandle,
}

impl ChatSession {
    pub fn new(config: SessionConfig, transport: Arc<dyn ChatTransport>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            conversation: Conversation::new(),
            transport,
            event_tx,
            handle: SessionHandle::new(),
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// A cloneable handle for stopping the session from another task
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Use `model` for subsequent requests
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.config.params.model = model.into();
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn is_streaming(&self) -> bool {
        self.handle.is_streaming()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Stop the in-flight exchange. Safe to call at any time.
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Stop any exchange and empty the conversation.
    pub fn clear(&mut self) {
        self.handle.stop();
        self.conversation.clear();
        self.emit(SessionEvent::Cleared);
    }

    /// Append the user's turn and stream a reply to it.
    pub async fn submit(&mut self, input: UserInput) -> Result<ExchangeOutcome> {
        if self.handle.is_running() {
            return Err(Error::Busy);
        }
        let message = input.into_message().ok_or(Error::EmptyMessage)?;

        self.conversation.append(message.clone());
        self.emit(SessionEvent::MessageAppended { message });

        let window = self.conversation.window(self.config.history_window);
        Ok(self.run_exchange(window).await)
    }

    /// Re-ask for the last reply.
    ///
    /// Drops the last turn whatever its role and streams a reply to what is
    /// left. After a failed exchange the last turn is the user's own, so it
    /// is discarded too. Returns `None` when nothing was sent: the
    /// conversation is empty or an exchange is already running.
    pub async fn regenerate(&mut self) -> Option<ExchangeOutcome> {
        if self.handle.is_running() || self.conversation.is_empty() {
            return None;
        }

        if let Some(message) = self.conversation.drop_last() {
            self.emit(SessionEvent::MessageRemoved { message });
        }

        let window = self.conversation.window(self.config.history_window);
        Some(self.run_exchange(window).await)
    }

    async fn run_exchange(&mut self, window: Vec<Message>) -> ExchangeOutcome {
        let cancel = self.handle.begin_exchange();
        self.emit(SessionEvent::StreamingChanged { active: true });

        tracing::debug!(turns = window.len(), "starting exchange");
        let request = ChatRequest::streaming(&self.config.params, window);

        let outcome = match self.transport.open(request, cancel.clone()).await {
            Ok(mut stream) => self.drive(&mut stream, &cancel).await,
            Err(e) => {
                tracing::error!("failed to open stream: {}", e);
                ExchangeOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        self.conversation.finish_reply();
        self.handle.finish_exchange();
        self.emit(SessionEvent::StreamingChanged { active: false });

        if let Some(last) = self.conversation.last() {
            tracing::debug!(role = %last.role, content = %last.content, "latest message");
        }
        self.emit(SessionEvent::ExchangeEnd {
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Fold transport events into the reply until a terminal event.
    ///
    /// The retry count only covers consecutive errors. A delta resets it, so
    /// a server that sends data and then drops the connection without
    /// `[DONE]` is reconnected indefinitely, and each replayed reply is
    /// appended to the buffer again. Only `stop()` ends such an exchange.
    async fn drive(
        &mut self,
        stream: &mut TransportStream,
        cancel: &CancellationToken,
    ) -> ExchangeOutcome {
        let mut reply = ReplyAccumulator::default();
        let mut retries = 0u32;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return ExchangeOutcome::Stopped,
                event = stream.next() => event,
            };

            let Some(event) = event else {
                if cancel.is_cancelled() {
                    return ExchangeOutcome::Stopped;
                }
                tracing::warn!("stream ended without a terminal event");
                return ExchangeOutcome::Failed {
                    reason: "stream ended unexpectedly".to_string(),
                };
            };

            let error = match event {
                TransportEvent::Open => {
                    self.set_streaming(true);
                    continue;
                }
                TransportEvent::Message(data) => match sse::parse_payload(&data) {
                    Ok(StreamPayload::Done) => {
                        self.handle.stop();
                        return ExchangeOutcome::Completed;
                    }
                    Ok(StreamPayload::Error(text)) => {
                        self.handle.stop();
                        self.conversation.append(Message::assistant(text.clone()));
                        self.emit(SessionEvent::MessageAppended {
                            message: Message::assistant(text.clone()),
                        });
                        return ExchangeOutcome::Reported { message: text };
                    }
                    Ok(StreamPayload::Delta(token)) => {
                        retries = 0;
                        let turn = reply.push(token.as_deref(), &mut self.conversation);
                        self.emit(SessionEvent::ReplyUpdated {
                            index: turn.index(),
                            content: reply.buffer.clone(),
                        });
                        continue;
                    }
                    Err(e) => {
                        tracing::debug!(payload = %data, "undecodable payload");
                        TransportError::from(e)
                    }
                },
                TransportEvent::Error(error) => error,
            };

            if let Some(outcome) = self.on_error(error, &mut retries) {
                return outcome;
            }
        }
    }

    /// Apply the retry policy to one error. Returns the outcome when the
    /// exchange should end.
    fn on_error(&mut self, error: TransportError, retries: &mut u32) -> Option<ExchangeOutcome> {
        self.set_streaming(false);

        match error {
            TransportError::Fatal(reason) => {
                tracing::error!("stream failed: {}", reason);
                self.handle.stop();
                Some(ExchangeOutcome::Failed { reason })
            }
            TransportError::Retriable(reason) => {
                *retries += 1;
                if *retries >= self.config.max_retries {
                    tracing::error!(attempts = *retries, "giving up: {}", reason);
                    self.handle.stop();
                    return Some(ExchangeOutcome::RetriesExhausted {
                        attempts: *retries,
                        last_error: reason,
                    });
                }
                tracing::warn!(
                    attempt = *retries,
                    max = self.config.max_retries,
                    "stream error, reconnecting: {}",
                    reason
                );
                self.emit(SessionEvent::Retrying {
                    attempt: *retries,
                    max_retries: self.config.max_retries,
                    error: reason,
                });
                None
            }
        }
    }

    fn set_streaming(&self, active: bool) {
        if self.handle.is_streaming() != active {
            self.handle.set_streaming(active);
            self.emit(SessionEvent::StreamingChanged { active });
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Token text received so far in one exchange, and the turn it is written to.
#[derive(Debug, Default)]
struct ReplyAccumulator {
    buffer: String,
    turn: Option<TurnId>,
}

impl ReplyAccumulator {
    /// Append a token and mirror the whole buffer into the trailing turn,
    /// creating that turn on the first call.
    fn push(&mut self, token: Option<&str>, conversation: &mut Conversation) -> TurnId {
        if let Some(token) = token {
            self.buffer.push_str(token);
        }
        let turn = match self.turn {
            Some(turn) if conversation.in_progress() == Some(turn) => turn,
            _ => {
                let turn = conversation.begin_reply();
                self.turn = Some(turn);
                turn
            }
        };
        conversation.update_reply(turn, &self.buffer);
        turn
    }
}
