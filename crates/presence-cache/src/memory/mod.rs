//! In-memory ephemeral store

mod backend;

pub use backend::{MemoryBackend, MemoryBackendBuilder, MemoryConnection};
