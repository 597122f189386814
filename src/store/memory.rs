//! In-process store

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::clock::Clock;
use crate::error::{ChatError, Result};
use crate::model::{Message, StoredMessage};
use super::{next_timestamp, MessageStore};

#[derive(Default)]
struct Inner {
    docs: HashMap<String, StoredMessage>,
    order: BTreeSet<(u64, String)>,
}

impl Inner {
    fn put(&mut self, id: &str, message: StoredMessage) -> Result<Message> {
        if self.docs.contains_key(id) {
            return Err(ChatError::Conflict(id.to_string()));
        }
        self.order.insert((message.timestamp, id.to_string()));
        self.docs.insert(id.to_string(), message.clone());
        Ok(message.into_message(id))
    }
}

/// Map of documents plus an ordered `(timestamp, id)` index, behind one lock
pub struct MemoryMessageStore {
    clock: Arc<dyn Clock>,
    inner: RwLock<Inner>,
}

impl MemoryMessageStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, inner: RwLock::new(Inner::default()) }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl MessageStore for MemoryMessageStore {
    fn insert(&self, id: &str, message: StoredMessage) -> Result<Message> {
        let mut inner = self.write();
        inner.put(id, message)
    }

    fn append(&self, id: &str, mut message: StoredMessage) -> Result<Message> {
        let mut inner = self.write();
        let newest = inner.order.iter().next_back().map(|(t, _)| *t);
        message.timestamp = next_timestamp(self.clock.now_millis(), newest);
        inner.put(id, message)
    }

    fn get(&self, id: &str) -> Result<Option<Message>> {
        Ok(self.read().docs.get(id).cloned().map(|m| m.into_message(id)))
    }

    fn list_ordered(&self) -> Result<Vec<Message>> {
        let inner = self.read();
        inner
            .order
            .iter()
            .map(|(_, id)| {
                inner
                    .docs
                    .get(id)
                    .cloned()
                    .map(|m| m.into_message(id.as_str()))
                    .ok_or_else(|| ChatError::StoreUnavailable(format!("index points at missing message {}", id)))
            })
            .collect()
    }

    fn len(&self) -> Result<usize> {
        Ok(self.read().docs.len())
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.write();
        inner.docs.clear();
        inner.order.clear();
        Ok(())
    }
}
