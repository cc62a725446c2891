//! # Domain Layer
//!
//! Pure provider logic with no I/O: algorithm tables, the handle registry,
//! key/hash/container entities, padding, TLS1 derivation and the key-blob
//! wire format.

pub mod algorithms;
pub mod blob;
pub mod config;
pub mod entities;
pub mod errors;
pub mod flags;
pub mod handles;
pub mod padding;
pub mod tls1;

pub use algorithms::{AlgId, AlgorithmInfo, HashClass, KeyClass, KeySpec, Personality};
pub use blob::{BlobType, RsaPrivateParts, RsaPublicParts};
pub use config::{ConfigError, ProviderConfig};
pub use entities::{
    CipherMode, HashObject, HashState, HmacInfo, KeyContainer, KeyObject, KeyState,
    KeysetScope, SChannelAlg,
};
pub use errors::{CspError, CspResult, HandleKind, StoreError};
pub use handles::{ContainerHandle, HandleRegistry, HashHandle, KeyHandle};
