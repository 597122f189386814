//! Process-wide service context
//!
//! Owns the store handle and the authenticator. The HTTP layer is a
//! thin shell over the operations here.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::{Authenticator, LmdbAuthStore};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::gate::{CredentialValidator, Gate, Principal};
use crate::model::{LoginRequest, LoginResponse, Message, MessageRequest};
use crate::pagination::{page, PAGE_SIZE};
use crate::store::{LmdbMessageStore, MemoryMessageStore, MessageStore};

pub struct ChatContext {
    store: Arc<dyn MessageStore>,
    auth: Arc<Authenticator>,
    gate: Gate,
}

impl ChatContext {
    /// Wire a context whose gate accepts the authenticator's sessions
    pub fn new(store: Arc<dyn MessageStore>, auth: Arc<Authenticator>) -> Self {
        let gate = Gate::new(auth.clone());
        Self { store, auth, gate }
    }

    /// Replace the gate's validator
    pub fn with_validator(mut self, validator: Arc<dyn CredentialValidator>) -> Self {
        self.gate = Gate::new(validator);
        self
    }

    /// Memory-backed context on the given clock
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MemoryMessageStore::new(clock.clone()));
        Self::new(store, Arc::new(Authenticator::new(clock)))
    }

    /// Build the context described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        match &config.db_path {
            Some(path) => {
                let store = LmdbMessageStore::open(path, clock.clone())?;
                let tables = Arc::new(LmdbAuthStore::open(store.env())?);
                let auth = Authenticator::with_store(tables, clock).with_session_ttl(config.session_ttl_secs);
                Ok(Self::new(Arc::new(store), Arc::new(auth)))
            }
            None => {
                info!("using in-memory message store");
                let store = Arc::new(MemoryMessageStore::new(clock.clone()));
                let auth = Authenticator::new(clock).with_session_ttl(config.session_ttl_secs);
                Ok(Self::new(store, Arc::new(auth)))
            }
        }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn auth(&self) -> &Arc<Authenticator> {
        &self.auth
    }

    /// Run the gate against a raw `Authorization` header
    pub fn authorize(&self, header: Option<&str>) -> Result<Principal> {
        self.gate.authorize(header)
    }

    pub fn login(&self, req: &LoginRequest) -> Result<LoginResponse> {
        let token = self.auth.login(&req.username, &req.password)?;
        Ok(LoginResponse { token })
    }

    pub fn logout(&self, principal: &Principal) -> Result<bool> {
        self.auth.revoke_session(&principal.token)
    }

    /// `GET /messages`: one page, oldest first. Requires a principal from the gate.
    pub fn list_messages(&self, principal: &Principal, from_id: Option<&str>) -> Result<Vec<Message>> {
        let messages = page(self.store.list_ordered()?, from_id, PAGE_SIZE)?;
        debug!(user = %principal.username, from_id = ?from_id, count = messages.len(), "listed messages");
        Ok(messages)
    }

    /// `POST /messages`
    pub fn post_message(&self, principal: &Principal, request: MessageRequest) -> Result<Message> {
        request.validate()?;
        let message = self.store.create(request)?;
        debug!(user = %principal.username, id = %message.id, "posted message");
        Ok(message)
    }

    /// Flush messages and sessions before the process exits
    pub fn shutdown(&self) -> Result<()> {
        self.store.flush()?;
        self.auth.flush()
    }
}
