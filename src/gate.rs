//! Access control gate for message endpoints

use std::sync::Arc;

use tracing::debug;

use crate::error::{ChatError, Result};

/// Decides whether a bearer token is acceptable; returns the owning username.
pub trait CredentialValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<String>;
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub token: String,
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[derive(Clone)]
pub struct Gate {
    validator: Arc<dyn CredentialValidator>,
}

impl Gate {
    pub fn new(validator: Arc<dyn CredentialValidator>) -> Self {
        Self { validator }
    }

    /// Pass or reject a request given its raw `Authorization` header.
    pub fn authorize(&self, header: Option<&str>) -> Result<Principal> {
        let token = header.and_then(bearer_token).ok_or_else(|| {
            debug!("missing bearer credential");
            ChatError::Unauthenticated
        })?;
        let username = self.validator.validate(token).map_err(|e| {
            debug!(error = %e, "credential rejected");
            ChatError::Unauthenticated
        })?;
        Ok(Principal { username, token: token.to_string() })
    }
}
