//! Test fixtures: unique ids and store wrappers that inject faults or latency

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use presence_core::{
    ConversationId, Document, DomainError, EphemeralStore, ProfilePatch, ProfileStore, StorePath,
    StoreResult, Subscription, UserId,
};
use serde_json::Value;

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> String {
    format!(
        "{}-{}",
        COUNTER.fetch_add(1, Ordering::SeqCst),
        uuid::Uuid::new_v4().simple()
    )
}

/// User id unique across test runs sharing one server
pub fn unique_user(prefix: &str) -> UserId {
    UserId::new(format!("{prefix}-{}", unique_suffix())).expect("generated ids are valid")
}

pub fn unique_conversation() -> ConversationId {
    ConversationId::new(format!("conv-{}", unique_suffix())).expect("generated ids are valid")
}

// ============================================================================
// Fault injection
// ============================================================================

/// Ephemeral store wrapper whose operations can be made to fail
pub struct FaultyEphemeralStore {
    inner: Arc<dyn EphemeralStore>,
    pub fail_writes: AtomicBool,
    pub fail_hooks: AtomicBool,
    pub fail_subscribe: AtomicBool,
}

impl FaultyEphemeralStore {
    pub fn new(inner: Arc<dyn EphemeralStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            fail_hooks: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
        }
    }

    pub fn failing_hooks(self) -> Self {
        self.fail_hooks.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_writes(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_subscribe(self) -> Self {
        self.fail_subscribe.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl EphemeralStore for FaultyEphemeralStore {
    async fn set(&self, path: &StorePath, value: Option<Value>) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::WriteRejected {
                path: path.to_string(),
                reason: "injected".into(),
            });
        }
        self.inner.set(path, value).await
    }

    async fn get(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        self.inner.get(path).await
    }

    async fn subscribe(&self, path: &StorePath) -> StoreResult<Subscription> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(DomainError::Subscription(format!("{path}: injected")));
        }
        self.inner.subscribe(path).await
    }

    async fn on_disconnect_set(&self, path: &StorePath, value: Option<Value>) -> StoreResult<()> {
        if self.fail_hooks.load(Ordering::SeqCst) {
            return Err(DomainError::Unsupported("disconnect hooks"));
        }
        self.inner.on_disconnect_set(path, value).await
    }

    async fn cancel_on_disconnect(&self, path: &StorePath) -> StoreResult<()> {
        if self.fail_hooks.load(Ordering::SeqCst) {
            return Err(DomainError::Unsupported("disconnect hooks"));
        }
        self.inner.cancel_on_disconnect(path).await
    }
}

/// Profile store wrapper whose operations can be made to fail
pub struct FaultyProfileStore {
    inner: Arc<dyn ProfileStore>,
    pub fail_merge: AtomicBool,
    pub fail_read: AtomicBool,
}

impl FaultyProfileStore {
    pub fn new(inner: Arc<dyn ProfileStore>) -> Self {
        Self {
            inner,
            fail_merge: AtomicBool::new(false),
            fail_read: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ProfileStore for FaultyProfileStore {
    async fn merge_write(
        &self,
        collection: &str,
        document_id: &str,
        patch: &ProfilePatch,
    ) -> StoreResult<()> {
        if self.fail_merge.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError("injected".into()));
        }
        self.inner.merge_write(collection, document_id, patch).await
    }

    async fn get_document(&self, collection: &str, document_id: &str) -> StoreResult<Option<Document>> {
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError("injected".into()));
        }
        self.inner.get_document(collection, document_id).await
    }
}

// ============================================================================
// Latency injection
// ============================================================================

/// Where injected latency sits relative to the write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latency {
    /// Applied immediately, acknowledged late
    AfterApply,
    /// Applied late
    BeforeApply,
}

/// Ephemeral store wrapper delaying `set` by a scripted sequence of latencies
pub struct DelayedEphemeralStore {
    inner: Arc<dyn EphemeralStore>,
    mode: Latency,
    delays: Mutex<VecDeque<Duration>>,
}

impl DelayedEphemeralStore {
    /// Each `set` takes the next delay; once exhausted, writes are immediate
    pub fn new(inner: Arc<dyn EphemeralStore>, mode: Latency, delays: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            inner,
            mode,
            delays: Mutex::new(delays.into_iter().collect()),
        }
    }

    fn next_delay(&self) -> Duration {
        self.delays.lock().pop_front().unwrap_or_default()
    }
}

#[async_trait]
impl EphemeralStore for DelayedEphemeralStore {
    async fn set(&self, path: &StorePath, value: Option<Value>) -> StoreResult<()> {
        let delay = self.next_delay();
        match self.mode {
            Latency::AfterApply => {
                let result = self.inner.set(path, value).await;
                tokio::time::sleep(delay).await;
                result
            }
            Latency::BeforeApply => {
                tokio::time::sleep(delay).await;
                self.inner.set(path, value).await
            }
        }
    }

    async fn get(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        self.inner.get(path).await
    }

    async fn subscribe(&self, path: &StorePath) -> StoreResult<Subscription> {
        self.inner.subscribe(path).await
    }

    async fn on_disconnect_set(&self, path: &StorePath, value: Option<Value>) -> StoreResult<()> {
        self.inner.on_disconnect_set(path, value).await
    }

    async fn cancel_on_disconnect(&self, path: &StorePath) -> StoreResult<()> {
        self.inner.cancel_on_disconnect(path).await
    }
}
