//! Server-timestamp sentinel
//!
//! A value written as `{".sv": "timestamp"}` is replaced by the store's own
//! clock (Unix milliseconds) at the moment the write is applied. Disconnect
//! fallbacks rely on this: they are registered long before they fire.

use serde_json::{Map, Value};

/// Key marking a server-resolved value
pub const SERVER_VALUE_KEY: &str = ".sv";

const TIMESTAMP: &str = "timestamp";

/// The server-timestamp placeholder
pub fn server_timestamp() -> Value {
    let mut map = Map::new();
    map.insert(SERVER_VALUE_KEY.to_string(), Value::from(TIMESTAMP));
    Value::Object(map)
}

/// Check whether a value is the server-timestamp placeholder
pub fn is_server_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.len() == 1 && map.get(SERVER_VALUE_KEY).and_then(Value::as_str) == Some(TIMESTAMP)
        }
        _ => false,
    }
}

/// Check whether a placeholder appears anywhere inside `value`
pub fn contains_server_values(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            is_server_timestamp(value) || map.values().any(contains_server_values)
        }
        Value::Array(items) => items.iter().any(contains_server_values),
        _ => false,
    }
}

/// Replace every placeholder inside `value` with `now_millis`
pub fn resolve_server_values(value: &mut Value, now_millis: i64) {
    if is_server_timestamp(value) {
        *value = Value::from(now_millis);
        return;
    }
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                resolve_server_values(child, now_millis);
            }
        }
        Value::Array(items) => {
            for child in items {
                resolve_server_values(child, now_millis);
            }
        }
        _ => {}
    }
}
