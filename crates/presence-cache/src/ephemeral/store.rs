//! Redis-backed ephemeral store.
//!
//! One [`RedisEphemeralStore`] is one client connection. Liveness is a key
//! with a TTL that a background heartbeat keeps refreshing; once it lapses
//! the [`LivenessSweeper`](super::LivenessSweeper) applies the client's
//! fallbacks. A graceful [`disconnect`](RedisEphemeralStore::disconnect)
//! applies them right away.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use presence_common::PresenceConfig;
use presence_core::{DomainError, EphemeralStore, Snapshot, StorePath, StoreResult, Subscription};
use redis::AsyncCommands;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::commands::{self, ClaimMode};
use super::keys;
use crate::error::{RedisResult, RedisStoreError};
use crate::pool::SharedRedisPool;

/// Client-side timing for the Redis store
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Liveness key TTL
    pub liveness_ttl: Duration,
    /// Liveness refresh period; must be shorter than the TTL. Raised to
    /// one millisecond if zero.
    pub heartbeat_interval: Duration,
    /// Buffered snapshots per subscription
    pub subscription_buffer: usize,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self::from(&PresenceConfig::default())
    }
}

impl From<&PresenceConfig> for RedisStoreConfig {
    fn from(config: &PresenceConfig) -> Self {
        Self {
            liveness_ttl: config.liveness_ttl(),
            heartbeat_interval: config.heartbeat_interval(),
            subscription_buffer: config.subscription_buffer,
        }
    }
}

/// Shortest accepted heartbeat period
const MIN_HEARTBEAT: Duration = Duration::from_millis(1);

impl RedisStoreConfig {
    fn ttl_secs(&self) -> u64 {
        self.liveness_ttl.as_secs().max(1)
    }

    fn heartbeat_period(&self) -> Duration {
        self.heartbeat_interval.max(MIN_HEARTBEAT)
    }
}

/// Ephemeral store connection backed by Redis
pub struct RedisEphemeralStore {
    pool: SharedRedisPool,
    client_id: String,
    config: RedisStoreConfig,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for RedisEphemeralStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEphemeralStore")
            .field("client_id", &self.client_id)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl RedisEphemeralStore {
    /// Register a new client and start its heartbeat
    pub async fn connect(pool: SharedRedisPool, config: RedisStoreConfig) -> RedisResult<Self> {
        let client_id = Uuid::new_v4().to_string();

        let mut conn = pool.get().await?;
        commands::refresh_liveness(&mut conn, &client_id, config.ttl_secs()).await?;
        drop(conn);

        let heartbeat = tokio::spawn(heartbeat_loop(
            pool.clone(),
            client_id.clone(),
            config.clone(),
        ));

        tracing::info!(client_id = %client_id, "Ephemeral store connected");

        Ok(Self {
            pool,
            client_id,
            config,
            heartbeat: Mutex::new(Some(heartbeat)),
            closed: AtomicBool::new(false),
        })
    }

    /// Id under which this connection's liveness and fallbacks are kept
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Close the connection gracefully and apply its fallbacks.
    ///
    /// Returns the number of fallbacks applied (zero if a sweeper got there
    /// first or the connection was already closed).
    pub async fn disconnect(&self) -> RedisResult<usize> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(0);
        }
        self.stop_heartbeat();

        let mut conn = self.pool.get().await?;
        let claim = commands::claim_fallbacks(
            &mut conn,
            &commands::claim_script(),
            &self.client_id,
            ClaimMode::Graceful,
        )
        .await?;
        if !claim.removed && claim.entries.is_empty() {
            tracing::info!(client_id = %self.client_id, "Fallbacks already applied by sweeper");
            return Ok(0);
        }
        let fired = commands::apply_fallbacks(&mut conn, &self.client_id, claim.entries).await?;

        tracing::info!(client_id = %self.client_id, fired, "Ephemeral store disconnected");
        Ok(fired)
    }

    fn stop_heartbeat(&self) {
        if let Some(handle) = self.heartbeat.lock().take() {
            handle.abort();
        }
    }

    fn ensure_open(&self) -> RedisResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(RedisStoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Drop for RedisEphemeralStore {
    fn drop(&mut self) {
        // Without a heartbeat the liveness key lapses and the sweeper takes over.
        self.stop_heartbeat();
    }
}

async fn heartbeat_loop(pool: SharedRedisPool, client_id: String, config: RedisStoreConfig) {
    let mut ticker = tokio::time::interval(config.heartbeat_period());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; registration already refreshed once.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let result = match pool.get().await {
            Ok(mut conn) => {
                commands::refresh_liveness(&mut conn, &client_id, config.ttl_secs()).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(true) => tracing::warn!(
                client_id = %client_id,
                "Liveness lapsed; fallbacks were applied and the client re-registered"
            ),
            Ok(false) => tracing::trace!(client_id = %client_id, "Heartbeat"),
            Err(e) => tracing::warn!(client_id = %client_id, error = %e, "Heartbeat failed"),
        }
    }
}

/// Forward published changes of one path into a subscription channel
async fn forward_changes(
    pubsub: redis::aio::PubSub,
    path: StorePath,
    tx: mpsc::Sender<Snapshot>,
) {
    let mut messages = std::pin::pin!(pubsub.into_on_message());

    while let Some(msg) = messages.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Unreadable change payload");
                continue;
            }
        };
        let value = match commands::decode(&payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Undecodable change payload");
                continue;
            }
        };
        if tx.send(Snapshot::new(path.clone(), value)).await.is_err() {
            return;
        }
    }

    tracing::warn!(path = %path, "Change listener ended");
}

#[async_trait]
impl EphemeralStore for RedisEphemeralStore {
    async fn set(&self, path: &StorePath, value: Option<Value>) -> StoreResult<()> {
        self.ensure_open()?;
        let mut conn = self.pool.get().await?;
        commands::write_node(&mut conn, path, value).await?;
        Ok(())
    }

    async fn get(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        self.ensure_open()?;
        let mut conn = self.pool.get().await?;
        Ok(commands::read_node(&mut conn, path).await?)
    }

    async fn subscribe(&self, path: &StorePath) -> StoreResult<Subscription> {
        self.ensure_open()?;

        // Subscribe before reading so no change between the two is lost.
        let mut pubsub = self.pool.pubsub().await?;
        pubsub
            .subscribe(keys::change_channel(path))
            .await
            .map_err(RedisStoreError::from)?;

        let mut conn = self.pool.get().await?;
        let initial = commands::read_node(&mut conn, path).await?;
        drop(conn);

        let (tx, rx) = mpsc::channel(self.config.subscription_buffer.max(1));
        tx.send(Snapshot::new(path.clone(), initial))
            .await
            .map_err(|_| DomainError::Subscription(format!("{path}: receiver dropped")))?;

        let forwarder = tokio::spawn(forward_changes(pubsub, path.clone(), tx));
        let snapshots = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|snapshot| (snapshot, rx))
        });

        tracing::debug!(client_id = %self.client_id, path = %path, "Subscribed");
        Ok(Subscription::new(path.clone(), snapshots.boxed()).with_cancel(move || forwarder.abort()))
    }

    async fn on_disconnect_set(&self, path: &StorePath, value: Option<Value>) -> StoreResult<()> {
        self.ensure_open()?;
        let encoded = commands::encode(value.as_ref())?;
        let mut conn = self.pool.get().await?;
        let _: () = conn
            .hset(keys::fallback_key(&self.client_id), path.as_str(), encoded)
            .await
            .map_err(RedisStoreError::from)?;
        Ok(())
    }

    async fn cancel_on_disconnect(&self, path: &StorePath) -> StoreResult<()> {
        self.ensure_open()?;
        let mut conn = self.pool.get().await?;
        let _: () = conn
            .hdel(keys::fallback_key(&self.client_id), path.as_str())
            .await
            .map_err(RedisStoreError::from)?;
        Ok(())
    }
}
