//! # presence-service
//!
//! Application layer: keeps a user's presence and typing state in the
//! ephemeral store, mirrors it into the profile store, and reacts to session
//! lifecycle events.

pub mod services;

pub use services::{
    AppState, CounterpartStatus, Effect, EffectOutcome, PresenceContext, PresenceContextBuilder,
    PresenceSynchronizer, ServiceError, ServiceResult, SessionEvent, SessionLifecycleObserver,
    SyncReport, TypingIndicator,
};
