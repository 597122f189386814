//! Login and session management
//!
//! Users are registered on first login. Tokens are opaque, handed out once
//! and only their SHA-256 hash is kept. Credentials and sessions live in an
//! [`AuthStore`]: in memory, or in LMDB next to the messages.

mod lmdb;
mod memory;

pub use lmdb::LmdbAuthStore;
pub use memory::MemoryAuthStore;

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{ChatError, Result};
use crate::gate::CredentialValidator;

/// Sessions kept per user; older ones are dropped when a new one opens
pub const MAX_SESSIONS_PER_USER: usize = 16;

/// Session info returned by list_sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub username: String,
    pub created_at: u64,
    pub expires_at: u64, // 0 = never
}

impl SessionInfo {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at > 0 && self.expires_at < now
    }

    /// `created_at|expires_at|username`
    fn encode(&self) -> String {
        format!("{}|{}|{}", self.created_at, self.expires_at, self.username)
    }

    fn decode(value: &str) -> Result<Self> {
        let mut parts = value.splitn(3, '|');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(created), Some(expires), Some(username)) => Ok(Self {
                username: username.to_string(),
                created_at: created.parse().map_err(|_| corrupt("session", value))?,
                expires_at: expires.parse().map_err(|_| corrupt("session", value))?,
            }),
            _ => Err(corrupt("session", value)),
        }
    }
}

/// Salted password hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    salt: String,
    hash: String,
}

impl Credential {
    pub fn new(password: &str) -> Result<Self> {
        let salt = generate_salt()?;
        let hash = hash_password(&salt, password);
        Ok(Self { salt, hash })
    }

    pub fn verify(&self, password: &str) -> bool {
        hash_password(&self.salt, password) == self.hash
    }

    /// `salt|hash`
    fn encode(&self) -> String {
        format!("{}|{}", self.salt, self.hash)
    }

    fn decode(value: &str) -> Result<Self> {
        let (salt, hash) = value.split_once('|').ok_or_else(|| corrupt("credential", value))?;
        Ok(Self { salt: salt.to_string(), hash: hash.to_string() })
    }
}

/// Token hashes to drop so at most `keep` of `sessions` (`(created_at, hash)`)
/// remain. The session just opened (`newest`) always survives.
fn evicted(mut sessions: Vec<(u64, String)>, keep: usize, newest: &str) -> Vec<String> {
    if sessions.len() <= keep {
        return Vec::new();
    }
    let excess = sessions.len() - keep;
    sessions.sort();
    sessions.into_iter().map(|(_, h)| h).filter(|h| h != newest).take(excess).collect()
}

fn corrupt(what: &str, value: &str) -> ChatError {
    ChatError::StoreUnavailable(format!("corrupt {} record: {}", what, value))
}

/// Backing tables for users and sessions. Sessions are keyed by token hash.
pub trait AuthStore: Send + Sync {
    /// The credential stored for `username`, or `candidate` after storing it
    /// if the user is new. Check and insert happen atomically.
    fn register_or_get(&self, username: &str, candidate: Credential) -> Result<Credential>;

    /// Store a session, then drop that user's oldest sessions beyond `keep`
    fn put_session(&self, token_hash: &str, session: &SessionInfo, keep: usize) -> Result<()>;

    fn get_session(&self, token_hash: &str) -> Result<Option<SessionInfo>>;

    fn remove_session(&self, token_hash: &str) -> Result<bool>;

    /// Sessions of `username`, expired or not, in no particular order
    fn sessions_for(&self, username: &str) -> Result<Vec<SessionInfo>>;

    fn remove_sessions_for(&self, username: &str) -> Result<usize>;

    /// Push pending writes to durable storage
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Fill `buf` from the OS RNG
fn random_bytes(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf).map_err(|e| ChatError::StoreUnavailable(e.to_string()))
}

/// Generate a cryptographically secure token (32 bytes, base64url encoded)
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    random_bytes(&mut bytes)?;
    Ok(base64url_encode(&bytes))
}

/// Hash token with SHA-256 for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Base64url encode without padding
fn base64url_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
    let mut result = String::with_capacity((data.len() * 4 + 2) / 3);
    for chunk in data.chunks(3) {
        let n = match chunk.len() {
            3 => ((chunk[0] as u32) << 16) | ((chunk[1] as u32) << 8) | (chunk[2] as u32),
            2 => ((chunk[0] as u32) << 16) | ((chunk[1] as u32) << 8),
            _ => (chunk[0] as u32) << 16,
        };
        result.push(ALPHABET[((n >> 18) & 0x3F) as usize] as char);
        result.push(ALPHABET[((n >> 12) & 0x3F) as usize] as char);
        if chunk.len() > 1 { result.push(ALPHABET[((n >> 6) & 0x3F) as usize] as char); }
        if chunk.len() > 2 { result.push(ALPHABET[(n & 0x3F) as usize] as char); }
    }
    result
}

mod hex {
    pub fn encode(data: impl AsRef<[u8]>) -> String {
        data.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Generate random salt (16 bytes, hex encoded)
fn generate_salt() -> Result<String> {
    let mut bytes = [0u8; 16];
    random_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}

/// Hash password with salt
fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// User credentials and live sessions
pub struct Authenticator {
    store: Arc<dyn AuthStore>,
    clock: Arc<dyn Clock>,
    session_ttl_ms: Option<u64>,
    max_sessions: usize,
}

impl Authenticator {
    /// In-memory tables, sessions never expire
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_store(Arc::new(MemoryAuthStore::new()), clock)
    }

    pub fn with_store(store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock, session_ttl_ms: None, max_sessions: MAX_SESSIONS_PER_USER }
    }

    /// Expire sessions `ttl_secs` after they open. `None` keeps them until revoked.
    pub fn with_session_ttl(mut self, ttl_secs: Option<u64>) -> Self {
        self.session_ttl_ms = ttl_secs.map(|t| t.saturating_mul(1000));
        self
    }

    /// Cap on concurrent sessions per user (at least one)
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max.max(1);
        self
    }

    /// Verify (or, for an unknown user, register) the password, then open a session.
    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ChatError::Validation("username and password are required".into()));
        }
        let candidate = Credential::new(password)?;
        let stored = self.store.register_or_get(username, candidate.clone())?;
        if stored == candidate {
            info!(%username, "registered user");
        } else if !stored.verify(password) {
            warn!(%username, "login rejected");
            return Err(ChatError::InvalidCredentials);
        }
        self.create_session(username)
    }

    /// Create a session, returns token
    pub fn create_session(&self, username: &str) -> Result<String> {
        let token = generate_token()?;
        let now = self.clock.now_millis();
        let info = SessionInfo {
            username: username.to_string(),
            created_at: now,
            expires_at: self.session_ttl_ms.map(|t| now.saturating_add(t)).unwrap_or(0),
        };
        self.store.put_session(&hash_token(&token), &info, self.max_sessions)?;
        Ok(token)
    }

    /// Validate token, returns username if valid
    pub fn validate_session(&self, token: &str) -> Result<String> {
        let hash = hash_token(token);
        let session = self.store.get_session(&hash)?.ok_or(ChatError::Unauthenticated)?;
        if session.is_expired(self.clock.now_millis()) {
            debug!(username = %session.username, "session expired");
            self.store.remove_session(&hash)?;
            return Err(ChatError::Unauthenticated);
        }
        Ok(session.username)
    }

    /// Revoke a session by token
    pub fn revoke_session(&self, token: &str) -> Result<bool> {
        self.store.remove_session(&hash_token(token))
    }

    /// Live sessions for a user, oldest first
    pub fn list_sessions(&self, username: &str) -> Result<Vec<SessionInfo>> {
        let now = self.clock.now_millis();
        let mut r: Vec<SessionInfo> = self
            .store
            .sessions_for(username)?
            .into_iter()
            .filter(|s| !s.is_expired(now))
            .collect();
        r.sort_by_key(|s| s.created_at);
        Ok(r)
    }

    /// Revoke all sessions for a user
    pub fn revoke_all_sessions(&self, username: &str) -> Result<usize> {
        self.store.remove_sessions_for(username)
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }
}

impl CredentialValidator for Authenticator {
    fn validate(&self, token: &str) -> Result<String> {
        self.validate_session(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_record_keeps_pipes_in_username() {
        let s = SessionInfo { username: "a|b".into(), created_at: 3, expires_at: 0 };
        assert_eq!(SessionInfo::decode(&s.encode()).unwrap(), s);
    }

    #[test]
    fn test_corrupt_records_rejected() {
        assert!(SessionInfo::decode("x|0|u").is_err());
        assert!(SessionInfo::decode("1|2").is_err());
        assert!(Credential::decode("nosep").is_err());
    }

    #[test]
    fn test_evicted_oldest_first() {
        let s = vec![(3, "c".to_string()), (1, "a".to_string()), (2, "b".to_string())];
        assert_eq!(evicted(s.clone(), 3, "c"), Vec::<String>::new());
        assert_eq!(evicted(s.clone(), 2, "c"), vec!["a"]);
        // A new session with an older clock reading is still kept
        assert_eq!(evicted(s, 1, "a"), vec!["b", "c"]);
    }

    #[test]
    fn test_credential_verify() {
        let c = Credential::new("pw").unwrap();
        assert!(c.verify("pw"));
        assert!(!c.verify("other"));
        assert_eq!(Credential::decode(&c.encode()).unwrap(), c);
    }
}
