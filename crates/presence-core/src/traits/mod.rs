//! Ports implemented by the infrastructure crates

mod stores;
mod subscription;

pub use stores::{EphemeralStore, ProfileStore, StoreResult};
pub use subscription::{Snapshot, Subscription};
