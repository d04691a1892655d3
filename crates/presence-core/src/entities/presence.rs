//! Presence record and disconnect fallback

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::value_objects::{server_timestamp, StorePath, UserId};

/// Online state of a user as seen in the ephemeral store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    /// Connected and in the foreground
    Online,
    /// Signed out, backgrounded, or disconnected
    #[default]
    Offline,
}

impl PresenceState {
    #[must_use]
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }

    /// Lowercase wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for PresenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PresenceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("Invalid presence state: {s}")),
        }
    }
}

/// Presence record stored at `/status/{userId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    /// Current state
    pub state: PresenceState,
    /// Client clock at the time of the write (Unix milliseconds)
    pub last_changed: i64,
}

impl PresenceRecord {
    #[must_use]
    pub fn new(state: PresenceState, last_changed: i64) -> Self {
        Self {
            state,
            last_changed,
        }
    }

    #[must_use]
    pub fn online(now_millis: i64) -> Self {
        Self::new(PresenceState::Online, now_millis)
    }

    #[must_use]
    pub fn offline(now_millis: i64) -> Self {
        Self::new(PresenceState::Offline, now_millis)
    }

    /// Serialize into the store's JSON form
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "state": self.state,
            "lastChanged": self.last_changed,
        })
    }

    /// Parse a stored record; `None` if absent or malformed
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Derive the observed state from a (possibly absent) stored node.
    ///
    /// Only the `state` field is consulted, so a record whose `lastChanged`
    /// is still unresolved or malformed is read the same way.
    #[must_use]
    pub fn state_of(value: Option<&Value>) -> PresenceState {
        match value
            .and_then(|v| v.get("state"))
            .and_then(Value::as_str)
        {
            Some("online") => PresenceState::Online,
            _ => PresenceState::Offline,
        }
    }
}

/// Pending write registered with the ephemeral store, applied by the store
/// when the registering connection is lost
#[derive(Debug, Clone, PartialEq)]
pub struct DisconnectFallback {
    /// Node the fallback writes to
    pub path: StorePath,
    /// Value to write (`None` removes the node)
    pub value: Option<Value>,
}

impl DisconnectFallback {
    /// Fallback writing `{state: offline, lastChanged: <server time>}`
    #[must_use]
    pub fn offline_presence(user_id: &UserId) -> Self {
        Self {
            path: StorePath::status(user_id),
            value: Some(json!({
                "state": PresenceState::Offline,
                "lastChanged": server_timestamp(),
            })),
        }
    }

    /// Fallback removing a node
    #[must_use]
    pub fn remove(path: StorePath) -> Self {
        Self { path, value: None }
    }
}
