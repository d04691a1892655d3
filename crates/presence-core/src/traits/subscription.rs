//! Subscription handle returned by [`EphemeralStore::subscribe`](super::EphemeralStore::subscribe)

use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::value_objects::StorePath;

/// Value of a node at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: StorePath,
    pub value: Option<Value>,
}

impl Snapshot {
    pub fn new(path: StorePath, value: Option<Value>) -> Self {
        Self { path, value }
    }

    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    pub fn val(&self) -> Option<&Value> {
        self.value.as_ref()
    }
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Stream of snapshots for one path.
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    path: StorePath,
    inner: BoxStream<'static, Snapshot>,
    on_cancel: Option<CancelFn>,
}

impl Subscription {
    pub fn new(path: StorePath, inner: BoxStream<'static, Snapshot>) -> Self {
        Self {
            path,
            inner,
            on_cancel: None,
        }
    }

    /// Attach a hook run exactly once when the subscription ends.
    ///
    /// The inner stream is dropped before the hook runs.
    #[must_use]
    pub fn with_cancel(mut self, on_cancel: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(on_cancel));
        self
    }

    /// A subscription that never yields
    pub fn pending(path: StorePath) -> Self {
        Self::new(path, stream::pending().boxed())
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Stop watching the path
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(on_cancel) = self.on_cancel.take() {
            self.inner = stream::empty().boxed();
            on_cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("cancel_hook", &self.on_cancel.is_some())
            .finish_non_exhaustive()
    }
}
