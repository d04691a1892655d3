//! In-memory implementation of ProfileStore

use async_trait::async_trait;
use dashmap::DashMap;
use presence_core::{Clock, Document, ProfilePatch, ProfileStore, StoreResult, SystemClock};
use std::sync::Arc;

/// Document store held in process memory.
///
/// Merge semantics match [`PgProfileStore`](super::PgProfileStore): named
/// fields overwrite, others are preserved, server timestamps use `clock`.
#[derive(Clone)]
pub struct MemoryProfileStore {
    documents: Arc<DashMap<(String, String), Document>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProfileStore")
            .field("documents", &self.documents.len())
            .finish()
    }
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            documents: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Replace a whole document (seeding fields other than presence)
    pub fn insert(&self, collection: &str, document_id: &str, document: Document) {
        self.documents
            .insert((collection.to_string(), document_id.to_string()), document);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn merge_write(
        &self,
        collection: &str,
        document_id: &str,
        patch: &ProfilePatch,
    ) -> StoreResult<()> {
        let resolved = patch.resolve(self.clock.now());
        self.documents
            .entry((collection.to_string(), document_id.to_string()))
            .or_default()
            .extend(resolved);
        Ok(())
    }

    async fn get_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> StoreResult<Option<Document>> {
        Ok(self
            .documents
            .get(&(collection.to_string(), document_id.to_string()))
            .map(|doc| doc.clone()))
    }
}
