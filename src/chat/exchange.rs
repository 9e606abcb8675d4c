//! Per-question chat exchange state machine.
//!
//! One [`ChatExchange`] turns one question into exactly one assistant turn.
//! It is fed [`StreamEvent`]s by a transport and knows nothing about HTTP:
//!
//! ```text
//! begin() ──▶ Connecting ──(first empty frame)──▶ Streaming ──(empty frame)──▶ Closed(Completed)
//!                 │                                   │
//!                 ├──────────── error ────────────────┼──▶ Closed(Failed)
//!                 └──────────── abort / drop ─────────┴──▶ Closed(Aborted)
//! ```
//!
//! Non-empty frames carry the full response so far, not a delta. They
//! replace the tracked text in either open phase.
//!
//! Every path into `Closed` appends the tracked text (possibly empty) as the
//! assistant turn and clears the partial response, so a question always
//! yields exactly two transcript entries. The single exception is
//! [`ClearPolicy::CancelStream`]: when the transcript was cleared while the
//! exchange was open, nothing is appended and the exchange closes as
//! [`CloseReason::Cleared`].

use crate::chat_store::ChatStore;
use crate::config::ClearPolicy;

/// One event delivered by a chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The connection was established. Carries no content.
    Open,
    /// A message frame. Empty and non-empty payloads have different meanings.
    Frame(String),
    /// The transport failed or the stream ended without a terminal frame.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// A terminal empty frame arrived.
    Completed,
    /// The transport reported an error.
    Failed(String),
    /// The caller closed the exchange.
    Aborted,
    /// The transcript was cleared while streaming under
    /// [`ClearPolicy::CancelStream`]; the answer was discarded.
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPhase {
    Connecting,
    Streaming,
    Closed(CloseReason),
}

impl StreamPhase {
    pub fn is_closed(&self) -> bool {
        matches!(self, StreamPhase::Closed(_))
    }
}

pub struct ChatExchange {
    store: ChatStore,
    policy: ClearPolicy,
    epoch: u64,
    response: String,
    phase: StreamPhase,
}

impl ChatExchange {
    /// Appends `question` as the user turn and enters `Connecting`.
    pub fn begin(store: ChatStore, question: &str, policy: ClearPolicy) -> Self {
        store.append(question);
        let epoch = store.epoch();
        tracing::debug!(epoch, "chat exchange started");
        Self {
            store,
            policy,
            epoch,
            response: String::new(),
            phase: StreamPhase::Connecting,
        }
    }

    pub fn phase(&self) -> &StreamPhase {
        &self.phase
    }

    /// Advances the state machine. Events after `Closed` are ignored.
    pub fn handle(&mut self, event: StreamEvent) -> &StreamPhase {
        if self.phase.is_closed() {
            return &self.phase;
        }
        if self.was_cancelled_by_clear() {
            self.phase = StreamPhase::Closed(CloseReason::Cleared);
            tracing::debug!("chat exchange discarded after clear");
            return &self.phase;
        }

        match event {
            StreamEvent::Open => {
                tracing::debug!("chat stream opened");
            }
            StreamEvent::Frame(data) if data.is_empty() => match self.phase {
                StreamPhase::Connecting => {
                    self.phase = StreamPhase::Streaming;
                }
                _ => self.finish(CloseReason::Completed),
            },
            StreamEvent::Frame(data) => {
                if self.store.set_partial_since(self.guard(), data.as_str()) {
                    self.response = data;
                } else {
                    self.phase = StreamPhase::Closed(CloseReason::Cleared);
                    tracing::debug!("chat exchange discarded after clear");
                }
            }
            StreamEvent::Error(message) => {
                tracing::warn!(error = %message, "chat stream failed");
                self.finish(CloseReason::Failed(message));
            }
        }
        &self.phase
    }

    /// Closes the exchange on the caller's behalf, flushing whatever text
    /// was received. No-op once closed.
    pub fn abort(&mut self) {
        if self.phase.is_closed() {
            return;
        }
        self.finish(CloseReason::Aborted);
    }

    /// Epoch that store writes are conditioned on; only set under
    /// [`ClearPolicy::CancelStream`].
    fn guard(&self) -> Option<u64> {
        (self.policy == ClearPolicy::CancelStream).then_some(self.epoch)
    }

    fn was_cancelled_by_clear(&self) -> bool {
        self.guard().is_some_and(|epoch| epoch != self.store.epoch())
    }

    fn finish(&mut self, reason: CloseReason) {
        let answer = std::mem::take(&mut self.response);
        let reason = if self.store.commit_answer_since(self.guard(), answer) {
            reason
        } else {
            CloseReason::Cleared
        };
        tracing::debug!(?reason, "chat exchange closed");
        self.phase = StreamPhase::Closed(reason);
    }
}

impl Drop for ChatExchange {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    fn store() -> ChatStore {
        ChatStore::open(Arc::new(MemoryStorage::new()))
    }

    fn frame(s: &str) -> StreamEvent {
        StreamEvent::Frame(s.to_string())
    }

    fn run(store: &ChatStore, question: &str, events: Vec<StreamEvent>) -> StreamPhase {
        let mut exchange = ChatExchange::begin(store.clone(), question, ClearPolicy::KeepStream);
        for event in events {
            if exchange.handle(event).is_closed() {
                break;
            }
        }
        exchange.abort();
        exchange.phase().clone()
    }

    #[test]
    fn latest_full_text_wins() {
        let store = store();
        let phase = run(
            &store,
            "q",
            vec![StreamEvent::Open, frame(""), frame("A"), frame("AB"), frame("")],
        );
        assert_eq!(phase, StreamPhase::Closed(CloseReason::Completed));
        assert_eq!(store.transcript(), vec!["q", "AB"]);
        assert_eq!(store.partial(), "");
    }

    #[test]
    fn first_empty_frame_is_not_terminal() {
        let store = store();
        let mut exchange = ChatExchange::begin(store.clone(), "q", ClearPolicy::KeepStream);
        assert_eq!(exchange.handle(frame("")), &StreamPhase::Streaming);
        assert_eq!(store.transcript(), vec!["q"]);
        exchange.handle(frame("partial"));
        assert_eq!(store.partial(), "partial");
        assert_eq!(exchange.handle(frame("")), &StreamPhase::Closed(CloseReason::Completed));
    }

    #[test]
    fn error_flushes_last_text() {
        let store = store();
        let phase = run(
            &store,
            "q",
            vec![frame(""), frame("AB"), StreamEvent::Error("reset".into())],
        );
        assert_eq!(phase, StreamPhase::Closed(CloseReason::Failed("reset".into())));
        assert_eq!(store.transcript(), vec!["q", "AB"]);
        assert_eq!(store.partial(), "");
    }

    #[test]
    fn error_before_any_frame_appends_empty_turn() {
        let store = store();
        run(&store, "q", vec![StreamEvent::Error("refused".into())]);
        assert_eq!(store.transcript(), vec!["q", ""]);
    }

    #[test]
    fn non_empty_frame_while_connecting_is_tracked() {
        let store = store();
        run(&store, "q", vec![frame("early"), StreamEvent::Error("eof".into())]);
        assert_eq!(store.transcript(), vec!["q", "early"]);
    }

    #[test]
    fn abort_flushes_once() {
        let store = store();
        let mut exchange = ChatExchange::begin(store.clone(), "q", ClearPolicy::KeepStream);
        exchange.handle(frame(""));
        exchange.handle(frame("half an ans"));
        exchange.abort();
        exchange.abort();
        assert_eq!(exchange.phase(), &StreamPhase::Closed(CloseReason::Aborted));
        drop(exchange);
        assert_eq!(store.transcript(), vec!["q", "half an ans"]);
        assert_eq!(store.partial(), "");
    }

    #[test]
    fn drop_acts_as_cleanup() {
        let store = store();
        {
            let mut exchange = ChatExchange::begin(store.clone(), "q", ClearPolicy::KeepStream);
            exchange.handle(frame("xyz"));
        }
        assert_eq!(store.transcript(), vec!["q", "xyz"]);
    }

    #[test]
    fn events_after_close_are_ignored() {
        let store = store();
        let mut exchange = ChatExchange::begin(store.clone(), "q", ClearPolicy::KeepStream);
        exchange.handle(frame(""));
        exchange.handle(frame("done"));
        exchange.handle(frame(""));
        exchange.handle(frame("late"));
        exchange.handle(StreamEvent::Error("late".into()));
        assert_eq!(store.transcript(), vec!["q", "done"]);
        assert_eq!(store.partial(), "");
    }

    #[test]
    fn n_exchanges_alternate() {
        let store = store();
        let scripts = vec![
            vec![frame(""), frame("one"), frame("")],
            vec![StreamEvent::Error("down".into())],
            vec![frame(""), frame("th"), frame("three")],
            vec![],
        ];
        let n = scripts.len();
        for (i, script) in scripts.into_iter().enumerate() {
            run(&store, &format!("q{}", i), script);
        }
        let transcript = store.transcript();
        assert_eq!(transcript.len(), 2 * n);
        for i in 0..n {
            assert_eq!(transcript[2 * i], format!("q{}", i));
        }
        assert_eq!(transcript[1], "one");
        assert_eq!(transcript[3], "");
        assert_eq!(transcript[5], "three");
        assert_eq!(transcript[7], "");
    }

    #[test]
    fn keep_stream_appends_after_clear() {
        let store = store();
        let mut exchange = ChatExchange::begin(store.clone(), "q", ClearPolicy::KeepStream);
        exchange.handle(frame(""));
        exchange.handle(frame("answer"));
        store.clear();
        exchange.handle(frame(""));
        assert_eq!(exchange.phase(), &StreamPhase::Closed(CloseReason::Completed));
        assert_eq!(store.transcript(), vec!["answer"]);
    }

    #[test]
    fn cancel_stream_discards_after_clear() {
        let store = store();
        let mut exchange = ChatExchange::begin(store.clone(), "q", ClearPolicy::CancelStream);
        exchange.handle(frame(""));
        exchange.handle(frame("answer"));
        store.clear();
        exchange.handle(frame("answer more"));
        assert_eq!(exchange.phase(), &StreamPhase::Closed(CloseReason::Cleared));
        drop(exchange);
        assert!(store.transcript().is_empty());
        assert_eq!(store.partial(), "");
    }

    #[test]
    fn cancel_stream_frame_after_clear_leaves_partial_empty() {
        let store = store();
        let mut exchange = ChatExchange::begin(store.clone(), "q", ClearPolicy::CancelStream);
        exchange.handle(frame(""));
        store.clear();
        // A frame racing the clear must not resurrect the partial text.
        assert!(!store.set_partial_since(Some(0), "stale"));
        exchange.handle(frame("stale"));
        drop(exchange);
        assert_eq!(store.partial(), "");
        assert!(store.transcript().is_empty());
    }

    #[test]
    fn cancel_stream_abort_after_clear_appends_nothing() {
        let store = store();
        let mut exchange = ChatExchange::begin(store.clone(), "q", ClearPolicy::CancelStream);
        exchange.handle(frame("text"));
        store.clear();
        exchange.abort();
        assert_eq!(exchange.phase(), &StreamPhase::Closed(CloseReason::Cleared));
        assert!(store.transcript().is_empty());
    }
}
