//! # Provider Service
//!
//! The main service implementing [`CryptoProviderApi`].
//!
//! ## Architecture
//!
//! This service:
//! 1. Owns the three handle registries (containers, keys, hashes)
//! 2. Drives algorithm work through a [`PrimitiveEngine`]
//! 3. Persists long-term keys through a [`KeysetStore`]
//!
//! Operations are split by concern: container lifecycle, key objects,
//! data transforms, hash objects, signatures, TLS1 derivation and key blobs.
//!
//! [`CryptoProviderApi`]: crate::ports::inbound::CryptoProviderApi

mod api;
mod blobs;
mod container;
mod hashes;
mod keys;
mod signature;
mod tls;
mod transform;

use crate::domain::config::{ConfigError, ProviderConfig};
use crate::domain::entities::{HashObject, KeyContainer, KeyObject};
use crate::domain::errors::{CspError, CspResult};
use crate::domain::handles::{
    ContainerHandle, ContainerTag, HandleRegistry, HashHandle, HashTag, KeyHandle, KeyTag,
};
use crate::ports::outbound::{KeysetStore, PrimitiveEngine};

pub(crate) type Key<E> = KeyObject<<E as PrimitiveEngine>::KeyContext>;
pub(crate) type Hash<E> = HashObject<<E as PrimitiveEngine>::HashContext>;

/// The provider.
///
/// Generic over its primitive engine and keyset store; all state lives in
/// the handle registries.
pub struct CryptoProvider<E, S>
where
    E: PrimitiveEngine,
    S: KeysetStore,
{
    /// Digests, ciphers, RSA and randomness.
    pub(crate) engine: E,
    /// Long-term key persistence.
    pub(crate) store: S,
    pub(crate) config: ProviderConfig,
    pub(crate) containers: HandleRegistry<ContainerTag, KeyContainer>,
    pub(crate) keys: HandleRegistry<KeyTag, Key<E>>,
    pub(crate) hashes: HandleRegistry<HashTag, Hash<E>>,
}

/// Dependencies for CryptoProvider
pub struct ProviderDependencies<E, S> {
    pub engine: E,
    pub store: S,
}

impl<E, S> CryptoProvider<E, S>
where
    E: PrimitiveEngine,
    S: KeysetStore,
{
    /// Create a provider with the given dependencies.
    ///
    /// The configuration is validated first.
    pub fn new(deps: ProviderDependencies<E, S>, config: ProviderConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        #[cfg(feature = "tracing-log")]
        tracing::info!(
            "[csp] provider ready (default container {:?}, {} handles per registry)",
            config.default_container,
            config.max_handles
        );

        Ok(Self {
            engine: deps.engine,
            store: deps.store,
            containers: HandleRegistry::with_capacity(config.max_handles),
            keys: HandleRegistry::with_capacity(config.max_handles),
            hashes: HandleRegistry::with_capacity(config.max_handles),
            config,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Number of live key handles.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Number of live hash handles.
    pub fn hash_count(&self) -> usize {
        self.hashes.len()
    }

    /// Number of open container handles.
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    pub(crate) fn container(&self, prov: ContainerHandle) -> CspResult<&KeyContainer> {
        self.containers.get(prov)
    }

    pub(crate) fn key(&self, key: KeyHandle) -> CspResult<&Key<E>> {
        self.keys.get(key)
    }

    pub(crate) fn key_mut(&mut self, key: KeyHandle) -> CspResult<&mut Key<E>> {
        self.keys.get_mut(key)
    }

    pub(crate) fn hash(&self, hash: HashHandle) -> CspResult<&Hash<E>> {
        self.hashes.get(hash)
    }

    pub(crate) fn hash_mut(&mut self, hash: HashHandle) -> CspResult<&mut Hash<E>> {
        self.hashes.get_mut(hash)
    }

    /// Fill a fresh buffer from the engine's random source.
    pub(crate) fn random_bytes(&self, len: usize) -> CspResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.engine.gen_random(&mut buf)?;
        Ok(buf)
    }
}

/// `MoreData` unless `buffer_len` holds `required` bytes.
pub(crate) fn ensure_capacity(buffer_len: usize, required: usize) -> CspResult<()> {
    if buffer_len < required {
        return Err(CspError::MoreData { required });
    }
    Ok(())
}
