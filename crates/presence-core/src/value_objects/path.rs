//! Ephemeral store paths
//!
//! Layout:
//! - `/status/{userId}` → presence record
//! - `/typing/{conversationId}/{userId}` → typing flag (present = typing)

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{ConversationId, UserId};
use crate::error::DomainError;

/// Root segment for presence records
pub const STATUS_ROOT: &str = "status";
/// Root segment for typing flags
pub const TYPING_ROOT: &str = "typing";

/// Slash-separated address of a node in the ephemeral store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorePath(String);

impl StorePath {
    /// Path of a user's presence record
    pub fn status(user_id: &UserId) -> Self {
        Self(format!("/{STATUS_ROOT}/{user_id}"))
    }

    /// Path of a user's typing flag within a conversation
    pub fn typing(conversation_id: &ConversationId, user_id: &UserId) -> Self {
        Self(format!("/{TYPING_ROOT}/{conversation_id}/{user_id}"))
    }

    /// Parse a path string (`/a/b/c`)
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(DomainError::InvalidPath(format!("{raw}: must start with '/'")));
        };
        if rest.is_empty() || rest.split('/').any(str::is_empty) {
            return Err(DomainError::InvalidPath(format!("{raw}: empty segment")));
        }
        Ok(Self(raw.to_string()))
    }

    /// The path as a string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StorePath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StorePath> for String {
    fn from(path: StorePath) -> Self {
        path.0
    }
}
