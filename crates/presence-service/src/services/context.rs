//! Service context - dependency container for presence services
//!
//! Holds the two stores and the clock. Every operation receives the acting
//! user explicitly; nothing here tracks a "current user".

use std::sync::Arc;

use presence_core::{Clock, EphemeralStore, ProfileStore, SystemClock};

use super::error::{ServiceError, ServiceResult};

/// Service context containing all dependencies
#[derive(Clone)]
pub struct PresenceContext {
    ephemeral: Arc<dyn EphemeralStore>,
    profiles: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
}

impl PresenceContext {
    /// Create a new context
    pub fn new(
        ephemeral: Arc<dyn EphemeralStore>,
        profiles: Arc<dyn ProfileStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ephemeral,
            profiles,
            clock,
        }
    }

    pub fn builder() -> PresenceContextBuilder {
        PresenceContextBuilder::new()
    }

    /// Get the ephemeral (realtime) store connection
    pub fn ephemeral(&self) -> &dyn EphemeralStore {
        self.ephemeral.as_ref()
    }

    /// Get the durable profile store
    pub fn profiles(&self) -> &dyn ProfileStore {
        self.profiles.as_ref()
    }

    /// Get the client clock
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl std::fmt::Debug for PresenceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceContext")
            .field("ephemeral", &"dyn EphemeralStore")
            .field("profiles", &"dyn ProfileStore")
            .field("now_millis", &self.clock.now_millis())
            .finish()
    }
}

/// Builder for creating PresenceContext
#[derive(Default)]
pub struct PresenceContextBuilder {
    ephemeral: Option<Arc<dyn EphemeralStore>>,
    profiles: Option<Arc<dyn ProfileStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl PresenceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ephemeral(mut self, store: Arc<dyn EphemeralStore>) -> Self {
        self.ephemeral = Some(store);
        self
    }

    pub fn profiles(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.profiles = Some(store);
        self
    }

    /// Clock for `lastChanged`; defaults to the system clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the PresenceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if a store is missing
    pub fn build(self) -> ServiceResult<PresenceContext> {
        Ok(PresenceContext::new(
            self.ephemeral
                .ok_or_else(|| ServiceError::validation("ephemeral store is required"))?,
            self.profiles
                .ok_or_else(|| ServiceError::validation("profile store is required"))?,
            self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
        ))
    }
}
