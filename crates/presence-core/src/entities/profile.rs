//! Durable profile documents and the online mirror kept inside them

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Collection holding one document per user
pub const USERS_COLLECTION: &str = "users";

/// Field carrying the mirrored online flag
pub const ONLINE_FIELD: &str = "online";
/// Field carrying the last time the user went offline
pub const LAST_SEEN_FIELD: &str = "lastSeen";

/// A stored profile document
pub type Document = Map<String, Value>;

/// Value of one field in a merge write
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Literal JSON value
    Value(Value),
    /// Replaced by the profile store's clock when the write is applied
    ServerTimestamp,
}

/// Set of fields merged into a document; fields not named are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    fields: BTreeMap<String, FieldValue>,
}

impl ProfilePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field to a literal value
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(field.into(), FieldValue::Value(value.into()));
        self
    }

    /// Set a field to the store's clock
    #[must_use]
    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldValue::ServerTimestamp);
        self
    }

    /// `{online: true}`
    pub fn went_online() -> Self {
        Self::new().set(ONLINE_FIELD, true)
    }

    /// `{online: false, lastSeen: <server time>}`
    pub fn went_offline() -> Self {
        Self::new()
            .set(ONLINE_FIELD, false)
            .server_timestamp(LAST_SEEN_FIELD)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Materialize the patch, resolving server timestamps with `now`.
    ///
    /// Timestamps are stored as RFC 3339 strings.
    pub fn resolve(&self, now: DateTime<Utc>) -> Document {
        self.fields
            .iter()
            .map(|(field, value)| {
                let value = match value {
                    FieldValue::Value(v) => v.clone(),
                    FieldValue::ServerTimestamp => Value::String(now.to_rfc3339()),
                };
                (field.clone(), value)
            })
            .collect()
    }
}

/// The `online`/`lastSeen` pair read back from a user's profile document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileOnlineMirror {
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl ProfileOnlineMirror {
    /// Extract the mirror; missing or mistyped fields read as offline / never seen
    pub fn from_document(document: &Document) -> Self {
        let online = document
            .get(ONLINE_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let last_seen = document.get(LAST_SEEN_FIELD).and_then(parse_timestamp);
        Self { online, last_seen }
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}
