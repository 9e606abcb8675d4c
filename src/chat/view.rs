//! Chat view: input gating, submission, and transcript rendering.
//!
//! The view owns at most one in-flight exchange. Input is disabled while
//! the partial response is non-empty or an exchange task is still running,
//! so a second stream can never be opened from the same view.

use std::sync::Arc;
use tokio::task::JoinHandle;

use super::exchange::{ChatExchange, CloseReason};
use super::transport::{drive, ChatTransport};
use crate::auth::TokenProvider;
use crate::chat_store::{ChatState, ChatStore, Role};
use crate::config::ClearPolicy;
use crate::persist::Snapshot;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error("a response is still streaming")]
    Busy,
    #[error("chat history has not been loaded yet")]
    NotHydrated,
}

/// One line of the rendered transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTurn {
    pub role: Role,
    pub text: String,
    /// `false` for the in-progress partial response.
    pub committed: bool,
}

/// Renders a store snapshot. Returns `None` before hydration so callers
/// never show provisional state as if it were the real history.
pub fn render(snapshot: &Snapshot<ChatState>) -> Option<Vec<RenderedTurn>> {
    if !snapshot.hydrated {
        return None;
    }
    let mut turns: Vec<RenderedTurn> = snapshot
        .state
        .transcript
        .iter()
        .enumerate()
        .map(|(i, text)| RenderedTurn {
            role: Role::for_index(i),
            text: text.clone(),
            committed: true,
        })
        .collect();
    if !snapshot.state.partial.is_empty() {
        turns.push(RenderedTurn {
            role: Role::Assistant,
            text: snapshot.state.partial.clone(),
            committed: false,
        });
    }
    Some(turns)
}

pub struct ChatView {
    store: ChatStore,
    transport: Arc<dyn ChatTransport>,
    tokens: Arc<dyn TokenProvider>,
    policy: ClearPolicy,
    in_flight: Option<JoinHandle<CloseReason>>,
}

impl ChatView {
    pub fn new(
        store: ChatStore,
        transport: Arc<dyn ChatTransport>,
        tokens: Arc<dyn TokenProvider>,
        policy: ClearPolicy,
    ) -> Self {
        Self {
            store,
            transport,
            tokens,
            policy,
            in_flight: None,
        }
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    pub fn is_streaming(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Whether the input and submit controls are enabled.
    pub fn is_input_enabled(&self) -> bool {
        self.store.partial().is_empty() && !self.is_streaming()
    }

    /// Appends the question and opens its stream in a background task.
    /// Returns as soon as the stream is opened.
    ///
    /// Must be called within a tokio runtime.
    pub fn submit(&mut self, question: &str) -> Result<(), SubmitError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SubmitError::EmptyQuestion);
        }
        if !self.store.is_hydrated() {
            return Err(SubmitError::NotHydrated);
        }
        if !self.is_input_enabled() {
            tracing::debug!("submit rejected while a response is streaming");
            return Err(SubmitError::Busy);
        }

        let exchange = ChatExchange::begin(self.store.clone(), question, self.policy);
        let token = self.tokens.bearer();
        let events = self.transport.open(question, token.as_deref());
        self.in_flight = Some(tokio::spawn(drive(exchange, events)));
        Ok(())
    }

    /// Waits for the in-flight exchange, if any, and returns how it closed.
    ///
    /// Cancel-safe: the task stays owned by the view until it completes, so
    /// dropping this future early leaves it to [`close`](Self::close).
    pub async fn wait(&mut self) -> Option<CloseReason> {
        let handle = self.in_flight.as_mut()?;
        let result = handle.await;
        self.in_flight = None;
        match result {
            Ok(reason) => Some(reason),
            Err(e) if e.is_cancelled() => Some(CloseReason::Aborted),
            Err(e) => {
                tracing::warn!(error = %e, "chat exchange task failed");
                Some(CloseReason::Failed(e.to_string()))
            }
        }
    }

    /// Closes the in-flight stream, flushing whatever text it received.
    pub async fn close(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Clears the transcript. Under [`ClearPolicy::KeepStream`] an in-flight
    /// stream keeps running and appends its answer afterwards; under
    /// [`ClearPolicy::CancelStream`] it is closed and its answer dropped.
    pub async fn clear(&mut self) {
        self.store.clear();
        if self.policy == ClearPolicy::CancelStream {
            self.close().await;
        }
    }

    pub fn render(&self) -> Option<Vec<RenderedTurn>> {
        render(&self.store.snapshot())
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}
