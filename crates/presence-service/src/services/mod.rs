//! Presence services
//!
//! The synchronizer owns the store writes; the typing indicator and the
//! lifecycle observer translate UI-level events into synchronizer calls.

pub mod context;
pub mod error;
pub mod lifecycle;
pub mod report;
pub mod synchronizer;
pub mod typing;

// Re-export all services for convenience
pub use context::{PresenceContext, PresenceContextBuilder};
pub use error::{ServiceError, ServiceResult};
pub use lifecycle::{AppState, SessionEvent, SessionLifecycleObserver};
pub use report::{Effect, EffectOutcome, SyncReport};
pub use synchronizer::{CounterpartStatus, PresenceSynchronizer};
pub use typing::TypingIndicator;
