//! Parlor - chat message backend
//!
//! Bearer-gated posting and listing of chat messages with cursor pagination.
//!
//! - [`store`]: message documents keyed by opaque ids (memory or LMDB)
//! - [`pagination`]: newest window by default, `fromId` pages forward
//! - [`gate`]: bearer credential check in front of every message operation
//! - [`auth`]: login and sessions (memory or LMDB, next to the messages)
//! - [`context`]: the service context the HTTP layer runs on

pub mod auth;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod model;
pub mod pagination;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

pub use auth::Authenticator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Command, Config};
pub use context::ChatContext;
pub use error::{ChatError, Result};
pub use gate::{CredentialValidator, Gate, Principal};
pub use model::{LoginRequest, LoginResponse, Message, MessageRequest, StoredMessage};
pub use pagination::{page, PAGE_SIZE};
pub use store::{LmdbMessageStore, MemoryMessageStore, MessageStore};
