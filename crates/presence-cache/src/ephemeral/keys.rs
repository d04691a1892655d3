//! Redis key and channel naming for the ephemeral tree.

use presence_core::StorePath;

/// Prefix of the key holding a node's JSON value
pub const NODE_PREFIX: &str = "eph:";
/// Prefix of the channel announcing a node's changes
pub const CHANGE_CHANNEL_PREFIX: &str = "eph_changes:";
/// Prefix of a client's liveness key (expires unless refreshed)
pub const ALIVE_PREFIX: &str = "alive:";
/// Prefix of the hash holding a client's fallbacks, field = path
pub const FALLBACK_PREFIX: &str = "ondisconnect:";
/// Set of clients that may still own fallbacks
pub const CLIENTS_SET: &str = "eph_clients";

/// Value stored under a client's liveness key
pub(crate) const ALIVE_MARKER: &str = "1";

#[must_use]
pub fn node_key(path: &StorePath) -> String {
    format!("{NODE_PREFIX}{path}")
}

#[must_use]
pub fn change_channel(path: &StorePath) -> String {
    format!("{CHANGE_CHANNEL_PREFIX}{path}")
}

#[must_use]
pub fn alive_key(client_id: &str) -> String {
    format!("{ALIVE_PREFIX}{client_id}")
}

#[must_use]
pub fn fallback_key(client_id: &str) -> String {
    format!("{FALLBACK_PREFIX}{client_id}")
}
