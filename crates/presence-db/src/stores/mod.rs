//! Profile store implementations

mod error;
mod memory_profile;
mod pg_profile;

pub use memory_profile::MemoryProfileStore;
pub use pg_profile::PgProfileStore;
