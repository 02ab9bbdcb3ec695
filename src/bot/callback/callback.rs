use std::{collections::HashMap, sync::{Arc, Mutex, MutexGuard, PoisonError}, time::Duration};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::bot::chat_event::chat_event::ChatEvent;

pub type CallbackSender = mpsc::Sender<Arc<ChatEvent>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("a session already exists for `{0}`")]
    AlreadyExists(String),
    #[error("no session registered for `{0}`")]
    NotFound(String),
}

/// Outcome of handing an event to a session mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The mailbox already held an unread event.
    Dropped,
    NoSession,
}

/// At most one pending interactive session per key.
#[derive(Clone, Default)]
pub struct CallbackManager {
    inner: Arc<Mutex<SessionTable>>,
}

#[derive(Default)]
struct SessionTable {
    sessions: HashMap<String, SessionSlot>,
    next_id: u64,
}

struct SessionSlot {
    id: u64,
    sender: CallbackSender,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capacity-1 mailbox under `key`. Fails if one is already open.
    pub fn make(&self, key: impl Into<String>) -> Result<CallbackSession, CallbackError> {
        let key = key.into();
        let mut table = self.lock();
        if table.sessions.contains_key(&key) {
            return Err(CallbackError::AlreadyExists(key));
        }

        table.next_id += 1;
        let id = table.next_id;
        let (sender, receiver) = mpsc::channel(1);
        table.sessions.insert(key.clone(), SessionSlot { id, sender });
        debug!("Opened session {key}");

        Ok(CallbackSession { key, id, receiver, manager: self.clone() })
    }

    pub fn get(&self, key: &str) -> Result<CallbackSender, CallbackError> {
        self.lock()
            .sessions
            .get(key)
            .map(|slot| slot.sender.clone())
            .ok_or_else(|| CallbackError::NotFound(key.to_string()))
    }

    /// Drops the registered sender, closing the mailbox so a waiting reader wakes with `None`.
    pub fn delete(&self, key: &str) {
        if self.lock().sessions.remove(key).is_some() {
            debug!("Closed session {key}");
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().sessions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-blocking hand-off of `event` to the session under `key`.
    pub fn deliver(&self, key: &str, event: Arc<ChatEvent>) -> Delivery {
        let Ok(sender) = self.get(key) else {
            return Delivery::NoSession;
        };

        match sender.try_send(event) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Closed(_)) => Delivery::NoSession,
        }
    }

    fn delete_if_current(&self, key: &str, id: u64) {
        let mut table = self.lock();
        if table.sessions.get(key).is_some_and(|slot| slot.id == id) {
            table.sessions.remove(key);
            debug!("Closed session {key}");
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionTable> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reader end of a session. Dropping it unregisters the key.
pub struct CallbackSession {
    key: String,
    id: u64,
    receiver: mpsc::Receiver<Arc<ChatEvent>>,
    manager: CallbackManager,
}

impl CallbackSession {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next delivered event, or `None` once the session has been deleted.
    pub async fn recv(&mut self) -> Option<Arc<ChatEvent>> {
        self.receiver.recv().await
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Arc<ChatEvent>> {
        tokio::time::timeout(timeout, self.receiver.recv()).await.ok().flatten()
    }

    pub fn close(self) {}
}

impl Drop for CallbackSession {
    fn drop(&mut self) {
        self.manager.delete_if_current(&self.key, self.id);
    }
}
