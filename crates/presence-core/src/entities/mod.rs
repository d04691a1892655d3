//! Domain entities

mod presence;
mod profile;
mod typing;

pub use presence::{DisconnectFallback, PresenceRecord, PresenceState};
pub use profile::{
    Document, FieldValue, ProfileOnlineMirror, ProfilePatch, LAST_SEEN_FIELD, ONLINE_FIELD,
    USERS_COLLECTION,
};
pub use typing::TypingFlag;
