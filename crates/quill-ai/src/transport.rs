//! Transport adapter: opens the event stream for one exchange

use std::{pin::Pin, time::Duration};

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::RequestBuilder;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest_eventsource::{Event, EventSource, retry::ExponentialBackoff};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result, TransportError},
    types::ChatRequest,
};

/// Lifecycle events surfaced by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection (or a reconnection) was accepted
    Open,
    /// One event's `data` field
    Message(String),
    /// The connection failed; retriable errors are followed by a reconnect
    Error(TransportError),
}

/// A stream of transport events for one exchange
pub type TransportStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Carries a chat request to the endpoint and streams back its events.
///
/// Implementations reconnect on their own after a retriable error and must
/// end the stream promptly once `cancel` fires.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: ChatRequest, cancel: CancellationToken)
    -> Result<TransportStream>;
}

/// Reconnect backoff configuration
///
/// There is no attempt limit here. A server that keeps closing the stream
/// after sending data, without `[DONE]`, is re-requested once per delay for
/// as long as the exchange runs.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first reconnect
    pub initial_delay: Duration,
    /// Maximum delay between reconnects
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    // The retry cap lives in the session, so the transport never gives up on its own.
    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.initial_delay,
            self.backoff_multiplier,
            Some(self.max_delay),
            None,
        )
    }

    /// Delay before reopening a closed event source
    fn delay(&self, attempt: i32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.clamp(0, 16));
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Server-sent-events transport over `reqwest-eventsource`
pub struct SseTransport {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    retry_config: RetryConfig,
}

impl SseTransport {
    /// Create a transport posting to `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key: None,
            retry_config: RetryConfig::default(),
        }
    }

    /// Send `Authorization: Bearer <key>` with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set reconnect backoff
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // `EventSource` adds `Accept: text/event-stream` itself.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref key) = self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| Error::InvalidConfig(format!("api key is not a valid header: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }
}

#[async_trait]
impl ChatTransport for SseTransport {
    async fn open(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<TransportStream> {
        let request_builder = self
            .client
            .post(&self.url)
            .headers(self.headers()?)
            .json(&request);

        let event_source = connect(&request_builder, &self.retry_config)?;

        tracing::debug!(
            url = %self.url,
            messages = request.messages.len(),
            "opening event stream"
        );

        Ok(Box::pin(create_stream(
            event_source,
            request_builder,
            self.retry_config.clone(),
            cancel,
        )))
    }
}

fn connect(request: &RequestBuilder, retry: &RetryConfig) -> Result<EventSource> {
    let builder = request
        .try_clone()
        .ok_or_else(|| Error::Sse("request body cannot be resent".to_string()))?;
    let mut event_source = EventSource::new(builder)
        .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;
    event_source.set_retry_policy(Box::new(retry.policy()));
    Ok(event_source)
}

/// Drive the event source until cancelled.
///
/// `EventSource` retries dropped connections itself but closes for good on a
/// bad status or content type; those get reopened here after a backoff.
fn create_stream(
    first: EventSource,
    request: RequestBuilder,
    retry: RetryConfig,
    cancel: CancellationToken,
) -> impl Stream<Item = TransportEvent> {
    stream! {
        let mut event_source = first;
        let mut reopened = 0;

        'connect: loop {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    next = event_source.next() => Some(next),
                };

                let Some(next) = next else {
                    tracing::debug!("exchange cancelled, closing event source");
                    event_source.close();
                    break 'connect;
                };

                match next {
                    Some(Ok(Event::Open)) => {
                        reopened = 0;
                        yield TransportEvent::Open;
                    }
                    Some(Ok(Event::Message(msg))) => yield TransportEvent::Message(msg.data),
                    Some(Err(e)) => {
                        let error = TransportError::classify(&e);
                        if !error.is_retriable() {
                            event_source.close();
                            yield TransportEvent::Error(error);
                            break 'connect;
                        }
                        yield TransportEvent::Error(error);
                    }
                    None => break,
                }
            }

            let delay = retry.delay(reopened);
            reopened += 1;
            tracing::debug!(?delay, attempt = reopened, "event source closed, reopening");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'connect,
                _ = tokio::time::sleep(delay) => {}
            }

            event_source = match connect(&request, &retry) {
                Ok(source) => source,
                Err(e) => {
                    yield TransportEvent::Error(TransportError::Fatal(e.to_string()));
                    break 'connect;
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompletionParams, Message};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_body(events: &[&str]) -> String {
        events.iter().map(|e| format!("data: {}\n\n", e)).collect()
    }

    fn request() -> ChatRequest {
        ChatRequest::streaming(&CompletionParams::default(), vec![Message::user("hi")])
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 1.0,
        }
    }

    #[test]
    fn test_reopen_delay_is_capped() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay(0), Duration::from_secs(1));
        assert_eq!(retry.delay(2), Duration::from_secs(4));
        assert_eq!(retry.delay(10), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_api_key_header() {
        let transport = SseTransport::new("http://localhost").with_api_key("bad\nkey");
        assert!(matches!(transport.headers(), Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_streams_events_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    sse_body(&[
                        r#"{"choices":[{"delta":{"content":"He"}}]}"#,
                        r#"{"choices":[{"delta":{"content":"llo"}}]}"#,
                        "[DONE]",
                    ]),
                    "text/event-stream",
                ),
            )
            .mount(&server)
            .await;

        let transport = SseTransport::new(format!("{}/api/chat/completions", server.uri()))
            .with_retry_config(fast_retry());
        let cancel = CancellationToken::new();
        let mut stream = transport.open(request(), cancel.clone()).await.unwrap();

        let events: Vec<_> =
            tokio::time::timeout(Duration::from_secs(5), stream.by_ref().take(4).collect())
                .await
                .expect("stream stalled");
        cancel.cancel();
        assert!(stream.next().await.is_none());

        assert_eq!(
            events,
            vec![
                TransportEvent::Open,
                TransportEvent::Message(r#"{"choices":[{"delta":{"content":"He"}}]}"#.to_string()),
                TransportEvent::Message(r#"{"choices":[{"delta":{"content":"llo"}}]}"#.to_string()),
                TransportEvent::Message("[DONE]".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_status_is_retriable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let transport = SseTransport::new(server.uri()).with_retry_config(fast_retry());
        let cancel = CancellationToken::new();
        let mut stream = transport.open(request(), cancel.clone()).await.unwrap();

        // The transport keeps reconnecting until cancelled
        for _ in 0..2 {
            match stream.next().await {
                Some(TransportEvent::Error(e)) => assert!(e.is_retriable(), "got {:?}", e),
                other => panic!("expected retriable error, got {:?}", other),
            }
        }

        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_retriable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("{}", "application/json"),
            )
            .mount(&server)
            .await;

        let transport = SseTransport::new(server.uri()).with_retry_config(fast_retry());
        let cancel = CancellationToken::new();
        let mut stream = transport.open(request(), cancel.clone()).await.unwrap();

        match stream.next().await {
            Some(TransportEvent::Error(TransportError::Retriable(msg))) => {
                assert!(msg.contains("content type"), "got {}", msg)
            }
            other => panic!("expected retriable error, got {:?}", other),
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_sends_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse_body(&["[DONE]"]), "text/event-stream"),
            )
            .expect(1..)
            .mount(&server)
            .await;

        let transport = SseTransport::new(server.uri())
            .with_api_key("sk-test")
            .with_retry_config(fast_retry());
        let cancel = CancellationToken::new();
        let mut stream = transport.open(request(), cancel.clone()).await.unwrap();

        assert_eq!(stream.next().await, Some(TransportEvent::Open));
        assert_eq!(
            stream.next().await,
            Some(TransportEvent::Message("[DONE]".to_string()))
        );
        cancel.cancel();
    }
}
