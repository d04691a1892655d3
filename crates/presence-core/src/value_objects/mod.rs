//! Value objects - identifiers, store paths, and server-resolved values

mod ids;
mod path;
mod server_value;

pub use ids::{ConversationId, UserId};
pub use path::{StorePath, STATUS_ROOT, TYPING_ROOT};
pub use server_value::{
    contains_server_values, is_server_timestamp, resolve_server_values, server_timestamp,
    SERVER_VALUE_KEY,
};
