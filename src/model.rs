//! Wire and storage shapes for messages and logins
//!
//! JSON bodies use camelCase (`imageUrl`, `fromId`) so clients of the HTTP
//! API see the same field names as the persisted documents.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// API-facing message. The wire shape is `{id, username, text, imageUrl}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub username: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    /// Milliseconds since the Unix epoch, assigned by the store
    #[serde(default, skip_serializing)]
    pub timestamp: u64,
}

/// Body of `POST /messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub username: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl MessageRequest {
    pub fn new(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self { username: username.into(), text: Some(text.into()), image_url: None }
    }

    /// Reject requests that would produce an empty message.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(ChatError::Validation("username is required".into()));
        }
        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        let has_image = self.image_url.as_deref().is_some_and(|u| !u.trim().is_empty());
        if !has_text && !has_image {
            return Err(ChatError::Validation("message needs text or an image".into()));
        }
        Ok(())
    }

    /// Document body for this request. Blank fields are dropped; the store
    /// fills in the timestamp when it appends the document.
    pub fn into_stored(self) -> StoredMessage {
        StoredMessage {
            username: self.username,
            timestamp: 0,
            text: self.text.filter(|t| !t.trim().is_empty()),
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
        }
    }
}

/// Persisted document body; the message id is the document key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub username: String,
    pub timestamp: u64,
    pub text: Option<String>,
    pub image_url: Option<String>,
}

impl StoredMessage {
    pub fn new(username: impl Into<String>, timestamp: u64, text: impl Into<String>) -> Self {
        Self { username: username.into(), timestamp, text: Some(text.into()), image_url: None }
    }

    pub fn into_message(self, id: impl Into<String>) -> Message {
        Message {
            id: id.into(),
            username: self.username,
            text: self.text,
            image_url: self.image_url,
            timestamp: self.timestamp,
        }
    }
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}
