//! LMDB credential and session tables
//!
//! Storage layout, in the same environment as the messages:
//! - `credentials`: username → `salt|hash`
//! - `sessions`: token hash → `created_at|expires_at|username`
//! - `sessions_by_user`: `username/hash` → created_at

use heed::types::Str;
use heed::{Database, Env, RoTxn};
use tracing::{debug, info};

use crate::error::{err, Result};
use super::{evicted, AuthStore, Credential, SessionInfo};

pub struct LmdbAuthStore {
    env: Env,
    credentials: Database<Str, Str>,
    sessions: Database<Str, Str>,
    sessions_by_user: Database<Str, Str>,
}

fn index_key(username: &str, hash: &str) -> String {
    format!("{}/{}", username, hash)
}

impl LmdbAuthStore {
    /// Open (creating if needed) the auth tables inside `env`
    pub fn open(env: &Env) -> Result<Self> {
        let mut tx = env.write_txn().map_err(err)?;
        let credentials = env.create_database(&mut tx, Some("credentials")).map_err(err)?;
        let sessions = env.create_database(&mut tx, Some("sessions")).map_err(err)?;
        let sessions_by_user = env.create_database(&mut tx, Some("sessions_by_user")).map_err(err)?;
        tx.commit().map_err(err)?;
        info!("opened auth tables");
        Ok(Self { env: env.clone(), credentials, sessions, sessions_by_user })
    }

    /// `(created_at, hash)` for every session of `username`
    fn index_entries(&self, tx: &RoTxn, username: &str) -> Result<Vec<(u64, String)>> {
        let prefix = format!("{}/", username);
        let mut r = Vec::new();
        for item in self.sessions_by_user.prefix_iter(tx, &prefix).map_err(err)? {
            let (key, created) = item.map_err(err)?;
            let hash = &key[prefix.len()..];
            // "a/" also prefixes the keys of a user named "a/b"
            if hash.contains('/') {
                continue;
            }
            r.push((created.parse().unwrap_or(0), hash.to_string()));
        }
        Ok(r)
    }
}

impl AuthStore for LmdbAuthStore {
    fn register_or_get(&self, username: &str, candidate: Credential) -> Result<Credential> {
        let mut tx = self.env.write_txn().map_err(err)?;
        if let Some(value) = self.credentials.get(&tx, username).map_err(err)? {
            return Credential::decode(value);
        }
        self.credentials.put(&mut tx, username, &candidate.encode()).map_err(err)?;
        tx.commit().map_err(err)?;
        Ok(candidate)
    }

    fn put_session(&self, token_hash: &str, session: &SessionInfo, keep: usize) -> Result<()> {
        let username = session.username.as_str();
        let mut tx = self.env.write_txn().map_err(err)?;
        self.sessions.put(&mut tx, token_hash, &session.encode()).map_err(err)?;
        self.sessions_by_user
            .put(&mut tx, &index_key(username, token_hash), &session.created_at.to_string())
            .map_err(err)?;

        let stale = evicted(self.index_entries(&tx, username)?, keep, token_hash);
        for hash in &stale {
            self.sessions.delete(&mut tx, hash).map_err(err)?;
            self.sessions_by_user.delete(&mut tx, &index_key(username, hash)).map_err(err)?;
        }
        tx.commit().map_err(err)?;
        if !stale.is_empty() {
            debug!(%username, dropped = stale.len(), "evicted old sessions");
        }
        Ok(())
    }

    fn get_session(&self, token_hash: &str) -> Result<Option<SessionInfo>> {
        let tx = self.env.read_txn().map_err(err)?;
        self.sessions.get(&tx, token_hash).map_err(err)?.map(SessionInfo::decode).transpose()
    }

    fn remove_session(&self, token_hash: &str) -> Result<bool> {
        let mut tx = self.env.write_txn().map_err(err)?;
        let session = match self.sessions.get(&tx, token_hash).map_err(err)? {
            Some(value) => SessionInfo::decode(value)?,
            None => return Ok(false),
        };
        self.sessions.delete(&mut tx, token_hash).map_err(err)?;
        self.sessions_by_user
            .delete(&mut tx, &index_key(&session.username, token_hash))
            .map_err(err)?;
        tx.commit().map_err(err)?;
        Ok(true)
    }

    fn sessions_for(&self, username: &str) -> Result<Vec<SessionInfo>> {
        let tx = self.env.read_txn().map_err(err)?;
        let mut r = Vec::new();
        for (_, hash) in self.index_entries(&tx, username)? {
            if let Some(value) = self.sessions.get(&tx, &hash).map_err(err)? {
                r.push(SessionInfo::decode(value)?);
            }
        }
        Ok(r)
    }

    fn remove_sessions_for(&self, username: &str) -> Result<usize> {
        let mut tx = self.env.write_txn().map_err(err)?;
        let hashes = self.index_entries(&tx, username)?;
        for (_, hash) in &hashes {
            self.sessions.delete(&mut tx, hash).map_err(err)?;
            self.sessions_by_user.delete(&mut tx, &index_key(username, hash)).map_err(err)?;
        }
        tx.commit().map_err(err)?;
        Ok(hashes.len())
    }

    fn flush(&self) -> Result<()> {
        self.env.force_sync().map_err(err)
    }
}
