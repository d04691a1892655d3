//! User and conversation identifiers
//!
//! Both identifiers end up as segments of ephemeral store paths, so they are
//! validated once at construction: non-empty and free of path-reserved
//! characters.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Characters that cannot appear inside a single path segment
const RESERVED_CHARS: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// Maximum segment length (bytes)
const MAX_SEGMENT_LEN: usize = 768;

fn validate_segment(kind: &'static str, value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::invalid_identifier(kind, "must not be empty"));
    }
    if value.len() > MAX_SEGMENT_LEN {
        return Err(DomainError::invalid_identifier(
            kind,
            format!("longer than {MAX_SEGMENT_LEN} bytes"),
        ));
    }
    if let Some(c) = value
        .chars()
        .find(|c| RESERVED_CHARS.contains(c) || c.is_control())
    {
        return Err(DomainError::invalid_identifier(
            kind,
            format!("contains reserved character {c:?}"),
        ));
    }
    Ok(())
}

/// Identity of an authenticated user
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a validated user id
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        validate_segment("user id", &id)?;
        Ok(Self(id))
    }

    /// Borrow the raw id
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for UserId {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Identity of a conversation (typing indicators are scoped by it)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Create a validated conversation id
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        validate_segment("conversation id", &id)?;
        Ok(Self(id))
    }

    /// Derive the id of the one-to-one conversation between two users.
    ///
    /// Symmetric: both participants derive the same id. Fails when the
    /// joined id exceeds the segment length limit.
    pub fn direct(a: &UserId, b: &UserId) -> Result<Self, DomainError> {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self::new(format!("{first}_{second}"))
    }

    /// Borrow the raw id
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ConversationId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
