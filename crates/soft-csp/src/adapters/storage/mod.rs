//! Storage Adapters
//!
//! Implementations of the `KeysetStore` trait.

mod memory;
#[cfg(feature = "file-store")]
mod file;

pub use memory::InMemoryKeysetStore;
#[cfg(feature = "file-store")]
pub use file::FileBackedKeysetStore;
