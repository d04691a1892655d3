//! Redis connection pool

mod redis_pool;

pub use redis_pool::{create_shared_pool, RedisPool, RedisPoolConfig, SharedRedisPool};
