//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the provider service drives:
//!
//! - [`PrimitiveEngine`]: digests, ciphers, RSA arithmetic and randomness
//! - [`KeysetStore`]: persistence of long-term container keys

use crate::domain::algorithms::{AlgId, KeySpec};
use crate::domain::blob::{RsaPrivateParts, RsaPublicParts};
use crate::domain::entities::KeysetScope;
use crate::domain::errors::{CspResult, StoreError};

/// Transform direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Which RSA exponent a block operation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaExponent {
    Public,
    Private,
}

// =============================================================================
// PRIMITIVE ENGINE
// =============================================================================

/// Algorithm primitives behind the provider.
///
/// Hash and key contexts are opaque to the service; it only clones them for
/// duplication and hands them back to the engine.
pub trait PrimitiveEngine: Send + Sync {
    type HashContext: Clone + Send + Sync;
    type KeyContext: Clone + Default + Send + Sync;

    /// Fresh digest context for `MD2`, `MD4`, `MD5` or `SHA`.
    fn init_hash(&self, alg: AlgId) -> CspResult<Self::HashContext>;

    fn update_hash(&self, ctx: &mut Self::HashContext, data: &[u8]);

    fn finalize_hash(&self, ctx: Self::HashContext) -> Vec<u8>;

    /// Schedule a symmetric key from `material` (key bytes then salt bytes).
    fn setup_key(
        &self,
        alg: AlgId,
        ctx: &mut Self::KeyContext,
        key_len: usize,
        salt_len: usize,
        material: &[u8],
    ) -> CspResult<()>;

    /// Generate an RSA pair with a `bits`-bit modulus.
    fn new_key_pair(
        &self,
        ctx: &mut Self::KeyContext,
        bits: usize,
        public_exponent: u32,
    ) -> CspResult<()>;

    /// Transform one cipher block (ECB).
    fn encrypt_block(
        &self,
        ctx: &Self::KeyContext,
        input: &[u8],
        direction: Direction,
    ) -> CspResult<Vec<u8>>;

    /// Transform a stream-cipher buffer in place, advancing the key stream.
    fn encrypt_stream(&self, ctx: &mut Self::KeyContext, data: &mut [u8]) -> CspResult<()>;

    /// Raise one modulus-sized block to the chosen exponent.
    ///
    /// `Encrypt` reads a big-endian block and returns it little-endian;
    /// `Decrypt` reads little-endian and returns big-endian. Output is
    /// always the modulus length.
    fn rsa_block(
        &self,
        ctx: &Self::KeyContext,
        input: &[u8],
        direction: Direction,
        exponent: RsaExponent,
    ) -> CspResult<Vec<u8>>;

    fn export_public_key(&self, ctx: &Self::KeyContext) -> CspResult<RsaPublicParts>;

    fn export_private_key(&self, ctx: &Self::KeyContext) -> CspResult<RsaPrivateParts>;

    fn import_public_key(&self, ctx: &mut Self::KeyContext, parts: &RsaPublicParts)
        -> CspResult<()>;

    fn import_private_key(
        &self,
        ctx: &mut Self::KeyContext,
        parts: &RsaPrivateParts,
    ) -> CspResult<()>;

    /// Fill `buf` from the system random source.
    fn gen_random(&self, buf: &mut [u8]) -> CspResult<()>;
}

// =============================================================================
// KEYSET STORE
// =============================================================================

/// Long-term keys of one container, as private-key blobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredKeyset {
    pub exchange_key: Option<Vec<u8>>,
    pub signature_key: Option<Vec<u8>>,
}

impl StoredKeyset {
    pub fn key(&self, spec: KeySpec) -> Option<&[u8]> {
        match spec {
            KeySpec::KeyExchange => self.exchange_key.as_deref(),
            KeySpec::Signature => self.signature_key.as_deref(),
        }
    }

    pub fn set_key(&mut self, spec: KeySpec, blob: Vec<u8>) {
        match spec {
            KeySpec::KeyExchange => self.exchange_key = Some(blob),
            KeySpec::Signature => self.signature_key = Some(blob),
        }
    }
}

/// Named keyset persistence, partitioned by scope.
pub trait KeysetStore: Send + Sync {
    fn exists(&self, scope: KeysetScope, name: &str) -> Result<bool, StoreError>;

    /// Create an empty keyset.
    ///
    /// ## Errors
    ///
    /// - `AlreadyExists`: a keyset with that name is present
    fn create(&mut self, scope: KeysetScope, name: &str) -> Result<(), StoreError>;

    /// ## Errors
    ///
    /// - `NotFound`: no keyset with that name
    fn load(&self, scope: KeysetScope, name: &str) -> Result<StoredKeyset, StoreError>;

    /// Replace one key blob, creating the keyset if needed.
    fn save_key(
        &mut self,
        scope: KeysetScope,
        name: &str,
        spec: KeySpec,
        blob: &[u8],
    ) -> Result<(), StoreError>;

    /// ## Errors
    ///
    /// - `NotFound`: no keyset with that name
    fn delete(&mut self, scope: KeysetScope, name: &str) -> Result<(), StoreError>;

    /// Names in the scope, sorted.
    fn list(&self, scope: KeysetScope) -> Result<Vec<String>, StoreError>;
}
