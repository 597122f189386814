//! LMDB-backed store
//!
//! Storage layout:
//! - `messages`: id → JSON document `{username, timestamp, text, imageUrl}`
//! - `by_time`: `[timestamp u64 BE][id bytes]` → id
//!
//! The index key sorts lexicographically in `(timestamp, id)` order, so a plain
//! forward cursor over `by_time` yields messages oldest first.

use std::path::Path;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{err, ChatError, Result};
use crate::model::{Message, StoredMessage};
use super::{next_timestamp, MessageStore};

/// Create the `by_time` key for a message
#[inline]
fn time_key(timestamp: u64, id: &str) -> Vec<u8> {
    let mut k = vec![0u8; 8 + id.len()];
    BigEndian::write_u64(&mut k[..8], timestamp);
    k[8..].copy_from_slice(id.as_bytes());
    k
}

/// Two message databases plus the three auth tables
const MAX_DBS: u32 = 5;

pub struct LmdbMessageStore {
    env: Env,
    messages: Database<Str, Bytes>,
    by_time: Database<Bytes, Str>,
    clock: Arc<dyn Clock>,
}

impl LmdbMessageStore {
    /// Open (creating if needed) the store rooted at `path`
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(err)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(1 << 30)
                .max_dbs(MAX_DBS)
                .open(path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let messages = env.create_database(&mut tx, Some("messages")).map_err(err)?;
        let by_time = env.create_database(&mut tx, Some("by_time")).map_err(err)?;
        tx.commit().map_err(err)?;
        info!(path = %path.display(), "opened message store");
        Ok(Self { env, messages, by_time, clock })
    }

    /// Handle to the underlying environment, for sibling tables
    pub fn env(&self) -> &Env {
        &self.env
    }

    fn put(&self, mut tx: RwTxn, id: &str, message: StoredMessage) -> Result<Message> {
        if self.messages.get(&tx, id).map_err(err)?.is_some() {
            return Err(ChatError::Conflict(id.to_string()));
        }
        let doc = serde_json::to_vec(&message).map_err(err)?;
        self.messages.put(&mut tx, id, &doc).map_err(err)?;
        self.by_time.put(&mut tx, &time_key(message.timestamp, id), id).map_err(err)?;
        tx.commit().map_err(err)?;
        debug!(%id, timestamp = message.timestamp, "stored message");
        Ok(message.into_message(id))
    }

    fn decode(&self, tx: &RoTxn, id: &str) -> Result<Option<Message>> {
        match self.messages.get(tx, id).map_err(err)? {
            Some(bytes) => {
                let stored: StoredMessage = serde_json::from_slice(bytes).map_err(err)?;
                Ok(Some(stored.into_message(id)))
            }
            None => Ok(None),
        }
    }
}

impl MessageStore for LmdbMessageStore {
    fn insert(&self, id: &str, message: StoredMessage) -> Result<Message> {
        let tx = self.env.write_txn().map_err(err)?;
        self.put(tx, id, message)
    }

    fn append(&self, id: &str, mut message: StoredMessage) -> Result<Message> {
        // Single writer: the newest key cannot move before this txn commits
        let tx = self.env.write_txn().map_err(err)?;
        let newest = self
            .by_time
            .last(&tx)
            .map_err(err)?
            .filter(|(key, _)| key.len() >= 8)
            .map(|(key, _)| BigEndian::read_u64(&key[..8]));
        message.timestamp = next_timestamp(self.clock.now_millis(), newest);
        self.put(tx, id, message)
    }

    fn get(&self, id: &str) -> Result<Option<Message>> {
        let tx = self.env.read_txn().map_err(err)?;
        self.decode(&tx, id)
    }

    fn list_ordered(&self) -> Result<Vec<Message>> {
        let tx = self.env.read_txn().map_err(err)?;
        let mut r = Vec::new();
        for item in self.by_time.iter(&tx).map_err(err)? {
            let (_, id) = item.map_err(err)?;
            let message = self
                .decode(&tx, id)?
                .ok_or_else(|| ChatError::StoreUnavailable(format!("index points at missing message {}", id)))?;
            r.push(message);
        }
        Ok(r)
    }

    fn len(&self) -> Result<usize> {
        let tx = self.env.read_txn().map_err(err)?;
        Ok(self.messages.len(&tx).map_err(err)? as usize)
    }

    fn clear(&self) -> Result<()> {
        let mut tx = self.env.write_txn().map_err(err)?;
        self.messages.clear(&mut tx).map_err(err)?;
        self.by_time.clear(&mut tx).map_err(err)?;
        tx.commit().map_err(err)
    }

    fn flush(&self) -> Result<()> {
        self.env.force_sync().map_err(err)
    }
}
