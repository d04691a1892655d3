//! Redis operations shared by the client store and the sweeper.

use deadpool_redis::Connection;
use presence_core::{contains_server_values, resolve_server_values, StorePath};
use redis::AsyncCommands;
use serde_json::Value;

use super::keys;
use crate::error::RedisResult;

/// Encode a node value for storage and publication (`null` means absent)
pub(crate) fn encode(value: Option<&Value>) -> RedisResult<String> {
    Ok(serde_json::to_string(&value)?)
}

/// Decode a stored or published node value
pub(crate) fn decode(raw: &str) -> RedisResult<Option<Value>> {
    let value: Option<Value> = serde_json::from_str(raw)?;
    Ok(value.filter(|v| !v.is_null()))
}

/// Redis server clock in Unix milliseconds
pub(crate) async fn server_time_millis(conn: &mut Connection) -> RedisResult<i64> {
    let (secs, micros): (i64, i64) = redis::cmd("TIME").query_async(&mut *conn).await?;
    Ok(secs * 1_000 + micros / 1_000)
}

/// Write or remove a node and publish the change in one transaction
pub(crate) async fn write_node(
    conn: &mut Connection,
    path: &StorePath,
    value: Option<Value>,
) -> RedisResult<()> {
    let mut value = value.filter(|v| !v.is_null());
    if let Some(v) = value.as_mut() {
        if contains_server_values(v) {
            let now = server_time_millis(conn).await?;
            resolve_server_values(v, now);
        }
    }

    let payload = encode(value.as_ref())?;
    let key = keys::node_key(path);

    let mut pipe = redis::pipe();
    pipe.atomic();
    if value.is_some() {
        pipe.set(&key, &payload).ignore();
    } else {
        pipe.del(&key).ignore();
    }
    pipe.publish(keys::change_channel(path), &payload).ignore();

    let _: () = pipe.query_async(&mut *conn).await?;
    Ok(())
}

/// Read a node
pub(crate) async fn read_node(conn: &mut Connection, path: &StorePath) -> RedisResult<Option<Value>> {
    let raw: Option<String> = conn.get(keys::node_key(path)).await?;
    match raw {
        Some(raw) => decode(&raw),
        None => Ok(None),
    }
}

/// Refresh a client's liveness key and (re-)register it.
///
/// Returns `true` when the client was not registered, which after the first
/// call means a sweeper already claimed it.
pub(crate) async fn refresh_liveness(
    conn: &mut Connection,
    client_id: &str,
    ttl_secs: u64,
) -> RedisResult<bool> {
    let (_, added): ((), i64) = redis::pipe()
        .atomic()
        .set_ex(keys::alive_key(client_id), keys::ALIVE_MARKER, ttl_secs)
        .sadd(keys::CLIENTS_SET, client_id)
        .query_async(&mut *conn)
        .await?;
    Ok(added == 1)
}

/// Claim a client and drain its fallbacks in one step.
///
/// KEYS: liveness key, client set, fallback hash. ARGV: client id, mode.
/// An `expired` claim backs off while the liveness key exists. A `graceful`
/// claim also drops the liveness key. Returns `{removed, flat entries}`.
const CLAIM_SCRIPT: &str = r"
if ARGV[2] == 'expired' and redis.call('EXISTS', KEYS[1]) == 1 then
    return {0, {}}
end
if ARGV[2] == 'graceful' then
    redis.call('DEL', KEYS[1])
end
local removed = redis.call('SREM', KEYS[2], ARGV[1])
local entries = redis.call('HGETALL', KEYS[3])
redis.call('DEL', KEYS[3])
return {removed, entries}
";

/// Who is claiming a client's fallbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClaimMode {
    /// The client closes its own connection
    Graceful,
    /// A sweeper found the client's liveness lapsed
    Expired,
}

impl ClaimMode {
    fn as_arg(self) -> &'static str {
        match self {
            Self::Graceful => "graceful",
            Self::Expired => "expired",
        }
    }
}

/// Fallbacks taken out of Redis by one claim
#[derive(Debug, Default)]
pub(crate) struct Claim {
    /// This caller removed the client from the client set
    pub removed: bool,
    /// Drained `(path, encoded value)` pairs
    pub entries: Vec<(String, String)>,
}

pub(crate) fn claim_script() -> redis::Script {
    redis::Script::new(CLAIM_SCRIPT)
}

/// Run the claim script for one client
pub(crate) async fn claim_fallbacks(
    conn: &mut Connection,
    script: &redis::Script,
    client_id: &str,
    mode: ClaimMode,
) -> RedisResult<Claim> {
    let (removed, flat): (i64, Vec<String>) = script
        .key(keys::alive_key(client_id))
        .key(keys::CLIENTS_SET)
        .key(keys::fallback_key(client_id))
        .arg(client_id)
        .arg(mode.as_arg())
        .invoke_async(&mut *conn)
        .await?;

    Ok(Claim {
        removed: removed == 1,
        entries: pair_up(flat),
    })
}

fn pair_up(flat: Vec<String>) -> Vec<(String, String)> {
    let mut items = flat.into_iter();
    let mut pairs = Vec::with_capacity(items.len() / 2);
    while let (Some(field), Some(value)) = (items.next(), items.next()) {
        pairs.push((field, value));
    }
    pairs
}

/// Apply drained fallbacks.
///
/// Entries that cannot be parsed are skipped with a warning.
pub(crate) async fn apply_fallbacks(
    conn: &mut Connection,
    client_id: &str,
    entries: Vec<(String, String)>,
) -> RedisResult<usize> {
    let mut fired = 0;
    for (raw_path, raw_value) in entries {
        let path = match StorePath::parse(&raw_path) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(client_id, path = %raw_path, error = %e, "Skipping fallback with bad path");
                continue;
            }
        };
        let value = match decode(&raw_value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(client_id, path = %path, error = %e, "Skipping undecodable fallback");
                continue;
            }
        };
        write_node(conn, &path, value).await?;
        fired += 1;
    }
    Ok(fired)
}
