//! Redis ephemeral store: client connection, key layout, and sweeper

mod commands;
pub mod keys;
mod store;
mod sweeper;

pub use store::{RedisEphemeralStore, RedisStoreConfig};
pub use sweeper::{LivenessSweeper, SweepStats};
