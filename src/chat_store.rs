//! Chat transcript store.
//!
//! Single source of truth for the chat transcript and the in-flight partial
//! response, shared between the chat view and the stream consumer. The
//! handle is cheap to clone; every clone sees the same state.
//!
//! Roles are positional: even turns are the user's, odd turns the
//! assistant's. The store does not enforce alternation, the exchange
//! state machine in [`crate::chat`] does.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::persist::{Persisted, Snapshot};
use crate::storage::Storage;

pub const CHAT_STORAGE_KEY: &str = "chat-storage";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatState {
    pub transcript: Vec<String>,
    pub partial: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            Role::User
        } else {
            Role::Assistant
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Odin",
        }
    }
}

struct Inner {
    persisted: Persisted<ChatState>,
    /// Bumped by every `clear()`. Not persisted.
    epoch: u64,
}

#[derive(Clone)]
pub struct ChatStore {
    inner: Arc<Mutex<Inner>>,
}

impl ChatStore {
    /// Creates an empty, not yet hydrated store.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                persisted: Persisted::new(storage, CHAT_STORAGE_KEY),
                epoch: 0,
            })),
        }
    }

    /// Creates the store and restores it from storage.
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let store = Self::new(storage);
        store.rehydrate();
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Restores the stored state. A non-empty partial response can only be
    /// left over from a run that died mid-stream; it is committed as the
    /// assistant turn so the transcript stays consistent and input unlocked.
    pub fn rehydrate(&self) {
        let mut inner = self.lock();
        inner.persisted.rehydrate();
        if !inner.persisted.state().partial.is_empty() {
            tracing::info!("recovering interrupted answer from previous session");
            inner.persisted.update(|state| {
                let answer = std::mem::take(&mut state.partial);
                state.transcript.push(answer);
            });
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.lock().persisted.is_hydrated()
    }

    /// Adds one turn to the end of the transcript.
    pub fn append(&self, turn: impl Into<String>) {
        let turn = turn.into();
        self.lock()
            .persisted
            .update(|state| state.transcript.push(turn));
    }

    /// Replaces the partial response text.
    pub fn set_partial(&self, text: impl Into<String>) {
        let text = text.into();
        self.lock().persisted.update(|state| state.partial = text);
    }

    /// Replaces the partial response unless the store was cleared after
    /// `epoch`. `None` skips the check. Returns whether the text was stored.
    pub fn set_partial_since(&self, epoch: Option<u64>, text: impl Into<String>) -> bool {
        let text = text.into();
        self.update_since(epoch, |state| state.partial = text)
    }

    /// Appends `answer` and resets the partial response in one step, unless
    /// the store was cleared after `epoch`.
    pub fn commit_answer_since(&self, epoch: Option<u64>, answer: String) -> bool {
        self.update_since(epoch, |state| {
            state.transcript.push(answer);
            state.partial.clear();
        })
    }

    // The epoch check and the mutation share one lock so a concurrent
    // `clear()` lands either before both or after both.
    fn update_since(&self, epoch: Option<u64>, f: impl FnOnce(&mut ChatState)) -> bool {
        let mut inner = self.lock();
        if epoch.is_some_and(|e| e != inner.epoch) {
            return false;
        }
        inner.persisted.update(f);
        true
    }

    /// Empties transcript and partial text in one observable step.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.persisted.update(|state| {
            state.transcript.clear();
            state.partial.clear();
        });
    }

    /// Number of `clear()` calls on this handle's store since it was created.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    pub fn snapshot(&self) -> Snapshot<ChatState> {
        self.lock().persisted.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<ChatState>> {
        self.lock().persisted.subscribe()
    }

    pub fn partial(&self) -> String {
        self.lock().persisted.state().partial.clone()
    }

    pub fn transcript(&self) -> Vec<String> {
        self.lock().persisted.state().transcript.clone()
    }
}
