//! Storage implementations for different backends

pub mod in_memory;
#[cfg(feature = "postgrest")]
pub mod postgrest;

pub use in_memory::InMemoryStore;
#[cfg(feature = "postgrest")]
pub use postgrest::PostgrestStore;
