//! In-process ephemeral store.
//!
//! A [`MemoryBackend`] plays the role of the realtime database server: it
//! holds the JSON tree and fans changes out to watchers. Each
//! [`MemoryConnection`] is one client connection with its own disconnect
//! fallbacks, applied by the backend when the connection goes away.

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use presence_core::{
    resolve_server_values, Clock, DomainError, EphemeralStore, Snapshot, StorePath, StoreResult,
    Subscription, SystemClock,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

const DEFAULT_WATCH_BUFFER: usize = 64;

struct BackendInner {
    nodes: Mutex<HashMap<StorePath, Value>>,
    watchers: DashMap<StorePath, broadcast::Sender<Option<Value>>>,
    clock: Arc<dyn Clock>,
    buffer: usize,
}

impl BackendInner {
    /// Apply a write and notify watchers. Notification happens under the
    /// tree lock so every watcher sees writes in the order they were applied.
    fn apply(&self, path: &StorePath, value: Option<Value>) {
        let value = value.filter(|v| !v.is_null()).map(|mut v| {
            resolve_server_values(&mut v, self.clock.now_millis());
            v
        });

        let mut nodes = self.nodes.lock();
        match &value {
            Some(v) => {
                nodes.insert(path.clone(), v.clone());
            }
            None => {
                nodes.remove(path);
            }
        }

        let orphaned = match self.watchers.get(path) {
            Some(tx) => tx.send(value).is_err(),
            None => false,
        };
        if orphaned {
            self.release(path);
        }
    }

    /// Forget a path's channel once nobody watches it
    fn release(&self, path: &StorePath) {
        self.watchers.remove_if(path, |_, tx| tx.receiver_count() == 0);
    }

    fn read(&self, path: &StorePath) -> Option<Value> {
        self.nodes.lock().get(path).cloned()
    }

    /// Current value plus a receiver positioned right after it
    fn watch(&self, path: &StorePath) -> (Option<Value>, broadcast::Receiver<Option<Value>>) {
        let nodes = self.nodes.lock();
        let rx = self
            .watchers
            .entry(path.clone())
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .subscribe();
        (nodes.get(path).cloned(), rx)
    }
}

/// Shared in-memory tree serving any number of connections
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<BackendInner>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("nodes", &self.inner.nodes.lock().len())
            .field("watched_paths", &self.inner.watchers.len())
            .finish()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Backend using the system clock for server timestamps
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MemoryBackendBuilder {
        MemoryBackendBuilder::default()
    }

    /// Open a new client connection
    pub fn connect(&self) -> MemoryConnection {
        let connection = MemoryConnection {
            id: Uuid::new_v4(),
            backend: self.clone(),
            fallbacks: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        };
        tracing::debug!(connection_id = %connection.id, "Memory connection opened");
        connection
    }

    /// Read a node directly, bypassing any connection
    pub fn value(&self, path: &StorePath) -> Option<Value> {
        self.inner.read(path)
    }

    fn subscribe(&self, path: &StorePath) -> Subscription {
        let (initial, rx) = self.inner.watch(path);
        let first = Snapshot::new(path.clone(), initial);

        let changes = stream::unfold(
            (rx, Arc::clone(&self.inner), path.clone()),
            |(mut rx, inner, path)| async move {
                let value = match rx.recv().await {
                    Ok(value) => value,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(path = %path, skipped, "Watcher lagged, resyncing");
                        let (current, fresh) = inner.watch(&path);
                        rx = fresh;
                        current
                    }
                    Err(RecvError::Closed) => return None,
                };
                Some((Snapshot::new(path.clone(), value), (rx, inner, path)))
            },
        );

        let inner = Arc::clone(&self.inner);
        let watched = path.clone();
        Subscription::new(path.clone(), stream::once(async move { first }).chain(changes).boxed())
            .with_cancel(move || inner.release(&watched))
    }
}

/// Builder for [`MemoryBackend`]
pub struct MemoryBackendBuilder {
    clock: Arc<dyn Clock>,
    buffer: usize,
}

impl Default for MemoryBackendBuilder {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
            buffer: DEFAULT_WATCH_BUFFER,
        }
    }
}

impl MemoryBackendBuilder {
    /// Clock used to resolve server timestamps
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Per-path change buffer; slower watchers resync from the current value
    #[must_use]
    pub fn buffer(mut self, size: usize) -> Self {
        self.buffer = size.max(1);
        self
    }

    pub fn build(self) -> MemoryBackend {
        MemoryBackend {
            inner: Arc::new(BackendInner {
                nodes: Mutex::new(HashMap::new()),
                watchers: DashMap::new(),
                clock: self.clock,
                buffer: self.buffer,
            }),
        }
    }
}

/// One client connection to a [`MemoryBackend`].
///
/// Dropping the connection counts as losing it: pending fallbacks are applied.
pub struct MemoryConnection {
    id: Uuid,
    backend: MemoryBackend,
    fallbacks: Mutex<HashMap<StorePath, Option<Value>>>,
    closed: AtomicBool,
}

impl MemoryConnection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the connection; the backend applies every registered fallback
    pub fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let fallbacks = std::mem::take(&mut *self.fallbacks.lock());
        let fired = fallbacks.len();
        for (path, value) in fallbacks {
            self.backend.inner.apply(&path, value);
        }

        tracing::debug!(connection_id = %self.id, fired, "Memory connection closed");
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            Err(DomainError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl EphemeralStore for MemoryConnection {
    async fn set(&self, path: &StorePath, value: Option<Value>) -> StoreResult<()> {
        self.ensure_open()?;
        self.backend.inner.apply(path, value);
        Ok(())
    }

    async fn get(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        self.ensure_open()?;
        Ok(self.backend.inner.read(path))
    }

    async fn subscribe(&self, path: &StorePath) -> StoreResult<Subscription> {
        self.ensure_open()?;
        Ok(self.backend.subscribe(path))
    }

    async fn on_disconnect_set(&self, path: &StorePath, value: Option<Value>) -> StoreResult<()> {
        self.ensure_open()?;
        self.fallbacks.lock().insert(path.clone(), value);
        Ok(())
    }

    async fn cancel_on_disconnect(&self, path: &StorePath) -> StoreResult<()> {
        self.ensure_open()?;
        self.fallbacks.lock().remove(path);
        Ok(())
    }
}
