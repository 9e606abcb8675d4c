//! Write-through persistence around an in-memory state value.
//!
//! [`Persisted`] is the decorator every client store is built on. It owns
//! the current state, writes it to [`Storage`] after every mutation, and
//! publishes a [`Snapshot`] on a `watch` channel so views can observe
//! changes. Loading from storage is a separate [`Persisted::rehydrate`]
//! step; until it has run, snapshots carry `hydrated: false` and views
//! must treat the state as provisional.
//!
//! Stored values use the envelope `{"state": ..., "version": 0}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use crate::storage::Storage;

/// Current on-disk schema version for all stores.
pub const STATE_VERSION: u32 = 0;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    state: T,
    version: u32,
}

/// Observable view of a store's state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub state: T,
    pub hydrated: bool,
}

pub struct Persisted<T> {
    key: String,
    storage: Arc<dyn Storage>,
    state: T,
    hydrated: bool,
    tx: watch::Sender<Snapshot<T>>,
}

impl<T> Persisted<T>
where
    T: Serialize + DeserializeOwned + Clone + Default,
{
    /// Creates a store holding `T::default()`. Nothing is read from storage
    /// until [`rehydrate`](Self::rehydrate) is called.
    pub fn new(storage: Arc<dyn Storage>, key: &str) -> Self {
        let state = T::default();
        let (tx, _rx) = watch::channel(Snapshot {
            state: state.clone(),
            hydrated: false,
        });
        Self {
            key: key.to_string(),
            storage,
            state,
            hydrated: false,
            tx,
        }
    }

    /// Loads the stored state, if any, and marks the store hydrated.
    ///
    /// Unreadable, corrupt, or version-mismatched data is logged and
    /// ignored; the store then starts from defaults.
    pub fn rehydrate(&mut self) {
        match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => match serde_json::from_str::<Envelope<T>>(&raw) {
                Ok(envelope) if envelope.version == STATE_VERSION => {
                    self.state = envelope.state;
                }
                Ok(envelope) => {
                    tracing::warn!(
                        key = %self.key,
                        version = envelope.version,
                        "ignoring stored state with unknown version"
                    );
                }
                Err(e) => {
                    tracing::warn!(key = %self.key, error = %e, "ignoring corrupt stored state");
                }
            },
            Ok(None) => {
                tracing::debug!(key = %self.key, "no stored state");
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to read stored state");
            }
        }

        self.hydrated = true;
        self.publish();
    }

    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            state: self.state.clone(),
            hydrated: self.hydrated,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.tx.subscribe()
    }

    /// Applies `f` to the state, writes the result through to storage, and
    /// publishes exactly one snapshot.
    ///
    /// A failed write is logged; the in-memory state stays authoritative.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let out = f(&mut self.state);
        self.write_through();
        self.publish();
        out
    }

    fn write_through(&self) {
        let envelope = Envelope {
            state: &self.state,
            version: STATE_VERSION,
        };
        let result = serde_json::to_string(&envelope)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.storage.set_item(&self.key, &json));
        if let Err(e) = result {
            tracing::warn!(key = %self.key, error = %e, "failed to persist state");
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        n: u32,
    }

    #[test]
    fn starts_unhydrated_with_defaults() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let store: Persisted<Counter> = Persisted::new(storage, "counter");
        assert!(!store.is_hydrated());
        assert_eq!(store.state().n, 0);
        assert!(!store.subscribe().borrow().hydrated);
    }

    #[test]
    fn update_writes_through_and_rehydrates() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store: Persisted<Counter> = Persisted::new(storage.clone(), "counter");
        store.rehydrate();
        store.update(|c| c.n = 7);

        let raw = storage.get_item("counter").unwrap().unwrap();
        assert_eq!(raw, r#"{"state":{"n":7},"version":0}"#);

        let mut reloaded: Persisted<Counter> = Persisted::new(storage, "counter");
        reloaded.rehydrate();
        assert!(reloaded.is_hydrated());
        assert_eq!(reloaded.state().n, 7);
    }

    #[test]
    fn corrupt_state_falls_back_to_defaults() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage.set_item("counter", "not json").unwrap();
        let mut store: Persisted<Counter> = Persisted::new(storage, "counter");
        store.rehydrate();
        assert!(store.is_hydrated());
        assert_eq!(store.state(), &Counter::default());
    }

    #[test]
    fn unknown_version_is_ignored() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage
            .set_item("counter", r#"{"state":{"n":3},"version":9}"#)
            .unwrap();
        let mut store: Persisted<Counter> = Persisted::new(storage, "counter");
        store.rehydrate();
        assert_eq!(store.state().n, 0);
    }

    #[test]
    fn each_update_publishes_once() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut store: Persisted<Counter> = Persisted::new(storage, "counter");
        let mut rx = store.subscribe();
        store.rehydrate();
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        store.update(|c| c.n += 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state.n, 1);
        assert!(!rx.has_changed().unwrap());
    }
}
