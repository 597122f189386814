//! In-process credential and session tables

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use super::{evicted, AuthStore, Credential, SessionInfo};

#[derive(Default)]
struct Inner {
    credentials: HashMap<String, Credential>,
    // token hash -> session
    sessions: HashMap<String, SessionInfo>,
}

#[derive(Default)]
pub struct MemoryAuthStore {
    inner: RwLock<Inner>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl AuthStore for MemoryAuthStore {
    fn register_or_get(&self, username: &str, candidate: Credential) -> Result<Credential> {
        Ok(self.write().credentials.entry(username.to_string()).or_insert(candidate).clone())
    }

    fn put_session(&self, token_hash: &str, session: &SessionInfo, keep: usize) -> Result<()> {
        let mut inner = self.write();
        inner.sessions.insert(token_hash.to_string(), session.clone());

        let mine: Vec<(u64, String)> = inner
            .sessions
            .iter()
            .filter(|(_, s)| s.username == session.username)
            .map(|(h, s)| (s.created_at, h.clone()))
            .collect();
        for hash in evicted(mine, keep, token_hash) {
            inner.sessions.remove(&hash);
        }
        Ok(())
    }

    fn get_session(&self, token_hash: &str) -> Result<Option<SessionInfo>> {
        Ok(self.read().sessions.get(token_hash).cloned())
    }

    fn remove_session(&self, token_hash: &str) -> Result<bool> {
        Ok(self.write().sessions.remove(token_hash).is_some())
    }

    fn sessions_for(&self, username: &str) -> Result<Vec<SessionInfo>> {
        Ok(self.read().sessions.values().filter(|s| s.username == username).cloned().collect())
    }

    fn remove_sessions_for(&self, username: &str) -> Result<usize> {
        let mut inner = self.write();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| s.username != username);
        Ok(before - inner.sessions.len())
    }
}
