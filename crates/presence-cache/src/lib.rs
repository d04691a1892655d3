//! # presence-cache
//!
//! Ephemeral store implementations.
//!
//! ## Features
//!
//! - **In-memory backend**: multi-connection tree with watchers and
//!   disconnect fallbacks, for tests and single-process use
//! - **Redis backend**: JSON nodes, pub/sub change feeds, heartbeat liveness
//! - **Sweeper**: applies fallbacks of clients whose liveness lapsed
//!
//! ## Example
//!
//! ```ignore
//! use presence_cache::{create_shared_pool, RedisEphemeralStore, RedisPoolConfig, RedisStoreConfig};
//!
//! let pool = create_shared_pool(RedisPoolConfig::default())?;
//! let store = RedisEphemeralStore::connect(pool, RedisStoreConfig::default()).await?;
//!
//! store.set(&StorePath::status(&user_id), Some(record.to_value())).await?;
//! ```

pub mod ephemeral;
pub mod error;
pub mod memory;
pub mod pool;

pub use ephemeral::{LivenessSweeper, RedisEphemeralStore, RedisStoreConfig, SweepStats};
pub use error::{RedisResult, RedisStoreError};
pub use memory::{MemoryBackend, MemoryBackendBuilder, MemoryConnection};
pub use pool::{create_shared_pool, RedisPool, RedisPoolConfig, SharedRedisPool};
