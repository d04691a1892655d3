//! Redis store errors

use presence_core::DomainError;

/// Error type for Redis-backed store operations
#[derive(Debug, thiserror::Error)]
pub enum RedisStoreError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] deadpool_redis::PoolError),

    #[error("Redis command error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store connection closed")]
    Closed,
}

/// Result type for Redis store operations
pub type RedisResult<T> = Result<T, RedisStoreError>;

impl From<RedisStoreError> for DomainError {
    fn from(err: RedisStoreError) -> Self {
        match err {
            RedisStoreError::Closed => Self::ConnectionClosed,
            RedisStoreError::Serialization(e) => Self::Serialization(e),
            other => Self::CacheError(other.to_string()),
        }
    }
}
