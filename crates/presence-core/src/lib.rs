//! # presence-core
//!
//! Domain layer for presence and typing synchronization: identifiers, store
//! paths, presence entities, the store ports (traits) implemented by the
//! infrastructure crates, and the clock abstraction.
//! This crate has zero dependencies on infrastructure (Redis, PostgreSQL, etc.).

pub mod clock;
pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use entities::{
    DisconnectFallback, Document, FieldValue, PresenceRecord, PresenceState, ProfileOnlineMirror,
    ProfilePatch, TypingFlag, USERS_COLLECTION,
};
pub use error::DomainError;
pub use traits::{EphemeralStore, ProfileStore, Snapshot, StoreResult, Subscription};
pub use value_objects::{
    contains_server_values, is_server_timestamp, resolve_server_values, server_timestamp,
    ConversationId, StorePath, UserId, SERVER_VALUE_KEY, STATUS_ROOT, TYPING_ROOT,
};
