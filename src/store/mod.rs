//! Message store adapter
//!
//! A store is a collection of message documents keyed by an opaque id.
//! Listing is always ascending by `(timestamp, id)`.

mod lmdb;
mod memory;

pub use lmdb::LmdbMessageStore;
pub use memory::MemoryMessageStore;

use tracing::debug;

use crate::error::{ChatError, Result};
use crate::model::{Message, MessageRequest, StoredMessage};

/// Length of a store-assigned id
pub const ID_LEN: usize = 20;

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const MAX_CREATE_ATTEMPTS: usize = 8;

pub trait MessageStore: Send + Sync {
    /// Create a document under `id` with the timestamp it carries.
    /// Fails with `Conflict` if the key is taken.
    fn insert(&self, id: &str, message: StoredMessage) -> Result<Message>;

    /// Create a document under `id` as the newest message. The timestamp is
    /// taken from the store clock inside the same write that publishes the
    /// document, and is bumped past the current newest entry if needed.
    fn append(&self, id: &str, message: StoredMessage) -> Result<Message>;

    fn get(&self, id: &str) -> Result<Option<Message>>;

    /// All messages, oldest first
    fn list_ordered(&self) -> Result<Vec<Message>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every message
    fn clear(&self) -> Result<()>;

    /// Push pending writes to durable storage
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Persist a new message under a fresh store-assigned id
    fn create(&self, request: MessageRequest) -> Result<Message> {
        let stored = request.into_stored();
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let id = generate_id()?;
            match self.append(&id, stored.clone()) {
                Err(ChatError::Conflict(_)) => debug!(%id, "id collision, retrying"),
                r => return r,
            }
        }
        Err(ChatError::StoreUnavailable("could not allocate a message id".into()))
    }
}

/// Timestamp for a message appended after `newest`
#[inline]
pub(crate) fn next_timestamp(now: u64, newest: Option<u64>) -> u64 {
    match newest {
        Some(t) if t >= now => t.saturating_add(1),
        _ => now,
    }
}

/// Random alphanumeric document id
pub fn generate_id() -> Result<String> {
    let mut id = String::with_capacity(ID_LEN);
    let mut bytes = [0u8; ID_LEN * 2];
    while id.len() < ID_LEN {
        getrandom::getrandom(&mut bytes).map_err(|e| ChatError::StoreUnavailable(e.to_string()))?;
        // 248 = 4 * 62, rejecting above keeps the distribution uniform
        for b in bytes.iter().filter(|b| **b < 248) {
            if id.len() == ID_LEN {
                break;
            }
            id.push(ID_ALPHABET[(*b as usize) % ID_ALPHABET.len()] as char);
        }
    }
    Ok(id)
}
