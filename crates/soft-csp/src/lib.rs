//! # Software Cryptographic Service Provider
//!
//! A handle-based cryptographic provider: key containers own long-term RSA
//! key pairs, session keys and hash objects are created under a container
//! and addressed through opaque handles.
//!
//! ## Architecture
//!
//! ```text
//! caller ──CryptoProviderApi──→ CryptoProvider ──PrimitiveEngine──→ digests, ciphers, RSA
//!                                     │
//!                                     └──────KeysetStore────────→ persisted key pairs
//! ```
//!
//! ## Personalities
//!
//! | Provider | Session keys | RSA | Extras |
//! |----------|--------------|-----|--------|
//! | Base | RC2/RC4 up to 56 bits, DES | 512 default | |
//! | Strong / Enhanced | RC2/RC4 up to 128 bits, DES, 3DES | 1024 default | |
//! | SChannel | as Strong | 1024 default | SSL/TLS masters, TLS1 PRF |
//!
//! ## Invariants
//!
//! | Object | Rule |
//! |--------|------|
//! | Handle | Typed; a stale or foreign handle is rejected, never reinterpreted |
//! | Key | A key mid-way through encrypting refuses to decrypt and vice versa |
//! | Hash | No data after the value has been read |
//! | TLS1 master | The master secret is derived once |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Algorithm tables, entities, padding, blobs, TLS1 PRF
//! - `ports/` - Inbound API and outbound engine/store traits
//! - `service/` - The provider implementing the API
//! - `adapters/` - Software primitives and keyset stores
//!
//! ## Usage
//!
//! ```ignore
//! use soft_csp::{
//!     AlgId, CryptoProvider, CryptoProviderApi, InMemoryKeysetStore, ProviderConfig,
//!     ProviderDependencies, SoftwarePrimitives,
//! };
//!
//! let deps = ProviderDependencies {
//!     engine: SoftwarePrimitives::new(),
//!     store: InMemoryKeysetStore::new(),
//! };
//! let mut csp = CryptoProvider::new(deps, ProviderConfig::default())?;
//! let prov = csp.acquire_context(None, CRYPT_VERIFYCONTEXT, None)?.unwrap();
//! let hash = csp.create_hash(prov, AlgId::SHA, None, 0)?;
//! csp.hash_data(prov, hash, b"abc", 0)?;
//! let digest = csp.get_hash_param(prov, hash, HashParam::HashValue, 20, 0)?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use adapters::{InMemoryKeysetStore, SoftHash, SoftKey, SoftwarePrimitives};
#[cfg(feature = "file-store")]
pub use adapters::FileBackedKeysetStore;
pub use domain::algorithms::{provider_names, AlgId, KeySpec, Personality};
pub use domain::blob::BlobType;
pub use domain::config::{ConfigError, ProviderConfig};
pub use domain::entities::{HashState, KeyState, KeysetScope, SChannelAlg};
pub use domain::errors::{CspError, CspResult, HandleKind, StoreError};
pub use domain::flags;
pub use domain::handles::{ContainerHandle, HashHandle, KeyHandle};
pub use ports::inbound::{
    CryptoProviderApi, HashParam, KeyParam, ParamInput, ParamValue, ProvParam,
};
pub use ports::outbound::{KeysetStore, PrimitiveEngine, StoredKeyset};
pub use service::{CryptoProvider, ProviderDependencies};
