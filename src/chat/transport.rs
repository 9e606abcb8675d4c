//! Chat stream transports.
//!
//! A [`ChatTransport`] opens one event stream per question and yields
//! [`StreamEvent`]s. [`SseTransport`] talks to the backend's
//! `GET /chat?question=...` server-sent-event endpoint; tests plug in
//! scripted transports instead.

use futures::stream::{self, BoxStream, StreamExt};
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Event, EventSource};

use super::exchange::{ChatExchange, CloseReason, StreamEvent, StreamPhase};

pub type EventStream = BoxStream<'static, StreamEvent>;

pub trait ChatTransport: Send + Sync {
    /// Opens a stream for `question`. `token` is sent as a bearer credential
    /// when present; without it the request goes out unauthenticated.
    ///
    /// Connection failures are reported as a [`StreamEvent::Error`] on the
    /// returned stream, never as an `Err` here.
    fn open(&self, question: &str, token: Option<&str>) -> EventStream;
}

pub struct SseTransport {
    client: reqwest::Client,
    base_url: String,
}

impl SseTransport {
    /// The client has no overall timeout: answers stream for as long as the
    /// backend keeps generating.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ChatTransport for SseTransport {
    fn open(&self, question: &str, token: Option<&str>) -> EventStream {
        let url = format!("{}/chat", self.base_url);
        tracing::debug!(%url, authenticated = token.is_some(), "opening chat stream");

        let mut request = self
            .client
            .get(&url)
            .query(&[("question", question)])
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        match EventSource::new(request) {
            Ok(mut es) => {
                es.set_retry_policy(Box::new(Never));
                es.map(|item| match item {
                    Ok(Event::Open) => StreamEvent::Open,
                    Ok(Event::Message(message)) => StreamEvent::Frame(message.data),
                    Err(e) => StreamEvent::Error(e.to_string()),
                })
                .boxed()
            }
            Err(e) => {
                let message = e.to_string();
                stream::once(async move { StreamEvent::Error(message) }).boxed()
            }
        }
    }
}

/// Feeds `events` into `exchange` until it closes.
///
/// A stream that ends without a terminal frame counts as a transport
/// error. The stream is dropped (and the connection closed) on return.
pub async fn drive(mut exchange: ChatExchange, mut events: EventStream) -> CloseReason {
    while let Some(event) = events.next().await {
        if let StreamPhase::Closed(reason) = exchange.handle(event) {
            return reason.clone();
        }
    }

    match exchange.handle(StreamEvent::Error("stream ended".to_string())) {
        StreamPhase::Closed(reason) => reason.clone(),
        _ => CloseReason::Aborted,
    }
}
