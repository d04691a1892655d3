//! # presence-db
//!
//! Durable profile store implementing the `ProfileStore` port.
//!
//! ## Overview
//!
//! - PostgreSQL documents stored as JSONB, merged field by field
//! - An in-memory store with the same merge semantics for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use presence_db::{create_pool, DatabaseConfig, PgProfileStore};
//!
//! let pool = create_pool(&DatabaseConfig::from_env()).await?;
//! let store = PgProfileStore::new(pool);
//! store.ensure_schema().await?;
//! ```

pub mod models;
pub mod pool;
pub mod stores;

// Re-export commonly used types
pub use pool::{create_pool, DatabaseConfig, PgPool};
pub use stores::{MemoryProfileStore, PgProfileStore};
