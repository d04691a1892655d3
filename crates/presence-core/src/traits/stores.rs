//! Store traits (ports) - the two backing stores the synchronizer writes to
//!
//! The ephemeral store is a realtime JSON tree addressed by [`StorePath`],
//! with per-path subscriptions and writes the store applies on behalf of a
//! connection once that connection is lost. The profile store holds durable
//! documents updated with field-level merges.

use async_trait::async_trait;
use serde_json::Value;

use super::subscription::Subscription;
use crate::entities::{Document, ProfilePatch};
use crate::error::DomainError;
use crate::value_objects::StorePath;

/// Result type for store operations
pub type StoreResult<T> = Result<T, DomainError>;

// ============================================================================
// Ephemeral Store
// ============================================================================

/// Realtime store scoped to a single client connection
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Write a node; `None` removes it.
    ///
    /// Server-timestamp placeholders inside `value` are resolved by the store.
    async fn set(&self, path: &StorePath, value: Option<Value>) -> StoreResult<()>;

    /// Read the current value of a node
    async fn get(&self, path: &StorePath) -> StoreResult<Option<Value>>;

    /// Watch a node. The first snapshot carries the current value, then one
    /// snapshot per change.
    async fn subscribe(&self, path: &StorePath) -> StoreResult<Subscription>;

    /// Register a write to apply when this connection is lost.
    ///
    /// At most one fallback is kept per path; registering again replaces it.
    async fn on_disconnect_set(&self, path: &StorePath, value: Option<Value>) -> StoreResult<()>;

    /// Drop a pending fallback for a path, if any
    async fn cancel_on_disconnect(&self, path: &StorePath) -> StoreResult<()>;
}

// ============================================================================
// Profile Store
// ============================================================================

/// Durable document store
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Merge fields into a document, creating it when absent.
    /// Fields not named in the patch are preserved.
    async fn merge_write(
        &self,
        collection: &str,
        document_id: &str,
        patch: &ProfilePatch,
    ) -> StoreResult<()>;

    /// Fetch a document
    async fn get_document(&self, collection: &str, document_id: &str)
        -> StoreResult<Option<Document>>;
}
