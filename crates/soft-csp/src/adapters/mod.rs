//! # Adapters Module
//!
//! Implementations of the outbound ports.
//!
//! ## Modules
//!
//! - `primitives`: software digests, ciphers and RSA
//! - `rc4`: RC4 key stream
//! - `storage`: in-memory and file-backed keyset stores

pub mod primitives;
mod rc4;
pub mod storage;

pub use primitives::{SoftHash, SoftKey, SoftwarePrimitives};
#[cfg(feature = "file-store")]
pub use storage::FileBackedKeysetStore;
pub use storage::InMemoryKeysetStore;
