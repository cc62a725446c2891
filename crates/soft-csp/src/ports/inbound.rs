//! # Inbound Ports (Driving Ports)
//!
//! The operation surface a binding layer calls into.
//!
//! Every operation takes the container handle it runs under and validates it
//! first. Buffer-producing operations take the caller's capacity and return
//! an owned buffer, or [`CspError::MoreData`] carrying the size to retry with.
//!
//! [`CspError::MoreData`]: crate::domain::errors::CspError::MoreData

use crate::domain::algorithms::AlgId;
use crate::domain::entities::SChannelAlg;
use crate::domain::errors::{CspError, CspResult};
use crate::domain::handles::{ContainerHandle, HashHandle, KeyHandle};

// =============================================================================
// PARAMETER IDS
// =============================================================================

/// Hash object parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashParam {
    AlgId,
    HashValue,
    HashSize,
    HmacInfo,
    Tls1PrfLabel,
    Tls1PrfSeed,
}

impl HashParam {
    pub fn from_u32(id: u32) -> CspResult<HashParam> {
        Ok(match id {
            1 => HashParam::AlgId,
            2 => HashParam::HashValue,
            4 => HashParam::HashSize,
            5 => HashParam::HmacInfo,
            6 => HashParam::Tls1PrfLabel,
            7 => HashParam::Tls1PrfSeed,
            other => return Err(CspError::BadType(other)),
        })
    }

    pub fn id(self) -> u32 {
        match self {
            HashParam::AlgId => 1,
            HashParam::HashValue => 2,
            HashParam::HashSize => 4,
            HashParam::HmacInfo => 5,
            HashParam::Tls1PrfLabel => 6,
            HashParam::Tls1PrfSeed => 7,
        }
    }
}

/// Key object parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyParam {
    Iv,
    Salt,
    Mode,
    ModeBits,
    Permissions,
    AlgId,
    BlockLen,
    KeyLen,
    SChannelAlg,
    ClientRandom,
    ServerRandom,
}

impl KeyParam {
    pub fn from_u32(id: u32) -> CspResult<KeyParam> {
        Ok(match id {
            1 => KeyParam::Iv,
            2 => KeyParam::Salt,
            4 => KeyParam::Mode,
            5 => KeyParam::ModeBits,
            6 => KeyParam::Permissions,
            7 => KeyParam::AlgId,
            8 => KeyParam::BlockLen,
            9 => KeyParam::KeyLen,
            20 => KeyParam::SChannelAlg,
            21 => KeyParam::ClientRandom,
            22 => KeyParam::ServerRandom,
            other => return Err(CspError::BadType(other)),
        })
    }

    pub fn id(self) -> u32 {
        match self {
            KeyParam::Iv => 1,
            KeyParam::Salt => 2,
            KeyParam::Mode => 4,
            KeyParam::ModeBits => 5,
            KeyParam::Permissions => 6,
            KeyParam::AlgId => 7,
            KeyParam::BlockLen => 8,
            KeyParam::KeyLen => 9,
            KeyParam::SChannelAlg => 20,
            KeyParam::ClientRandom => 21,
            KeyParam::ServerRandom => 22,
        }
    }
}

/// Provider (container) parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvParam {
    EnumAlgs,
    EnumContainers,
    ImpType,
    Name,
    Version,
    Container,
    EnumAlgsEx,
    SigKeysizeInc,
    KeyxKeysizeInc,
}

impl ProvParam {
    pub fn from_u32(id: u32) -> CspResult<ProvParam> {
        Ok(match id {
            1 => ProvParam::EnumAlgs,
            2 => ProvParam::EnumContainers,
            3 => ProvParam::ImpType,
            4 => ProvParam::Name,
            5 => ProvParam::Version,
            6 => ProvParam::Container,
            22 => ProvParam::EnumAlgsEx,
            34 => ProvParam::SigKeysizeInc,
            35 => ProvParam::KeyxKeysizeInc,
            other => return Err(CspError::BadType(other)),
        })
    }
}

// =============================================================================
// PARAMETER VALUES
// =============================================================================

/// A parameter read back from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Dword(u32),
    Bytes(Vec<u8>),
    /// Reported on the wire NUL-terminated.
    Text(String),
}

impl ParamValue {
    /// Size of the wire form.
    pub fn wire_len(&self) -> usize {
        match self {
            ParamValue::Dword(_) => 4,
            ParamValue::Bytes(bytes) => bytes.len(),
            ParamValue::Text(text) => text.len() + 1,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ParamValue::Dword(value) => value.to_le_bytes().to_vec(),
            ParamValue::Bytes(bytes) => bytes.clone(),
            ParamValue::Text(text) => {
                let mut out = text.as_bytes().to_vec();
                out.push(0);
                out
            }
        }
    }

    /// Fail with `MoreData` when `buffer_len` cannot hold the wire form.
    pub fn fit(self, buffer_len: usize) -> CspResult<ParamValue> {
        let required = self.wire_len();
        if buffer_len < required {
            return Err(CspError::MoreData { required });
        }
        Ok(self)
    }

    pub fn as_dword(&self) -> Option<u32> {
        match self {
            ParamValue::Dword(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ParamValue::Bytes(bytes) => Some(bytes),
            ParamValue::Text(text) => Some(text.as_bytes()),
            ParamValue::Dword(_) => None,
        }
    }
}

/// A parameter written into a key or hash object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamInput<'a> {
    Dword(u32),
    Bytes(&'a [u8]),
    SChannelAlg(SChannelAlg),
    HmacInfo {
        hash_alg: AlgId,
        inner: &'a [u8],
        outer: &'a [u8],
    },
}

// =============================================================================
// PROVIDER API
// =============================================================================

/// Primary API of the provider.
///
/// Implementations must validate the container handle before anything else
/// and fail with the specific error kind; see [`CspError`].
pub trait CryptoProviderApi {
    /// Open, create or delete a key container.
    ///
    /// Returns `None` for `CRYPT_DELETEKEYSET`, which produces no handle.
    ///
    /// ## Errors
    ///
    /// - `AlreadyExists`: `CRYPT_NEWKEYSET` on an existing container
    /// - `KeysetNotFound`: opening or deleting a missing container
    /// - `BadFlags`: `CRYPT_VERIFYCONTEXT` with a name, or an unknown flag mix
    fn acquire_context(
        &mut self,
        container: Option<&str>,
        flags: u32,
        provider_name: Option<&str>,
    ) -> CspResult<Option<ContainerHandle>>;

    /// Drop one reference; the last one persists the long-term keys.
    fn release_context(&mut self, prov: ContainerHandle, flags: u32) -> CspResult<()>;

    fn get_prov_param(
        &mut self,
        prov: ContainerHandle,
        param: ProvParam,
        buffer_len: usize,
        flags: u32,
    ) -> CspResult<ParamValue>;

    /// Not supported; fails with `BadType` once the handle is validated.
    fn set_prov_param(&mut self, prov: ContainerHandle, param: u32, flags: u32) -> CspResult<()>;

    /// Generate a key. `alg` may be `AT_SIGNATURE`/`AT_KEYEXCHANGE` to bind
    /// the new pair into the container slot.
    fn gen_key(&mut self, prov: ContainerHandle, alg: AlgId, flags: u32) -> CspResult<KeyHandle>;

    fn derive_key(
        &mut self,
        prov: ContainerHandle,
        alg: AlgId,
        base_data: HashHandle,
        flags: u32,
    ) -> CspResult<KeyHandle>;

    fn destroy_key(&mut self, prov: ContainerHandle, key: KeyHandle) -> CspResult<()>;

    /// Deep copy. `reserved` and `flags` must be zero.
    fn duplicate_key(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        reserved: u32,
        flags: u32,
    ) -> CspResult<KeyHandle>;

    fn get_key_param(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        param: KeyParam,
        buffer_len: usize,
        flags: u32,
    ) -> CspResult<ParamValue>;

    fn set_key_param(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        param: KeyParam,
        value: ParamInput<'_>,
        flags: u32,
    ) -> CspResult<()>;

    fn export_key(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        wrapping_key: Option<KeyHandle>,
        blob_type: u32,
        flags: u32,
        buffer_len: usize,
    ) -> CspResult<Vec<u8>>;

    fn import_key(
        &mut self,
        prov: ContainerHandle,
        data: &[u8],
        unwrapping_key: Option<KeyHandle>,
        flags: u32,
    ) -> CspResult<KeyHandle>;

    /// New handle to the key bound in a container slot.
    ///
    /// ## Errors
    ///
    /// - `NoKey`: the slot is empty or `key_spec` is unknown
    fn get_user_key(&mut self, prov: ContainerHandle, key_spec: u32) -> CspResult<KeyHandle>;

    /// Encrypt `data`. The optional hash receives the plaintext first.
    ///
    /// ## Errors
    ///
    /// - `MoreData`: `buffer_len` is smaller than the ciphertext
    /// - `BadKeyState`: the key is mid-way through a decryption
    /// - `BadData`: non-final block input not a multiple of the block size
    #[allow(clippy::too_many_arguments)]
    fn encrypt(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        hash: Option<HashHandle>,
        is_final: bool,
        flags: u32,
        data: &[u8],
        buffer_len: usize,
    ) -> CspResult<Vec<u8>>;

    /// Decrypt `data`. The optional hash receives the recovered plaintext.
    fn decrypt(
        &mut self,
        prov: ContainerHandle,
        key: KeyHandle,
        hash: Option<HashHandle>,
        is_final: bool,
        flags: u32,
        data: &[u8],
    ) -> CspResult<Vec<u8>>;

    fn create_hash(
        &mut self,
        prov: ContainerHandle,
        alg: AlgId,
        key: Option<KeyHandle>,
        flags: u32,
    ) -> CspResult<HashHandle>;

    fn hash_data(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        data: &[u8],
        flags: u32,
    ) -> CspResult<()>;

    fn hash_session_key(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        key: KeyHandle,
        flags: u32,
    ) -> CspResult<()>;

    /// Read a hash parameter. Reading the value finalizes the hash, except
    /// for TLS1 PRF hashes, which produce `buffer_len` bytes on every read.
    fn get_hash_param(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        param: HashParam,
        buffer_len: usize,
        flags: u32,
    ) -> CspResult<ParamValue>;

    fn set_hash_param(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        param: HashParam,
        value: ParamInput<'_>,
        flags: u32,
    ) -> CspResult<()>;

    fn destroy_hash(&mut self, prov: ContainerHandle, hash: HashHandle) -> CspResult<()>;

    fn duplicate_hash(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        reserved: u32,
        flags: u32,
    ) -> CspResult<HashHandle>;

    /// Sign the hash value with the private key in `key_spec`.
    fn sign_hash(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        key_spec: u32,
        flags: u32,
        buffer_len: usize,
    ) -> CspResult<Vec<u8>>;

    /// Check `signature` against the hash value.
    ///
    /// ## Errors
    ///
    /// - `BadSignature`: any mismatch
    fn verify_signature(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        signature: &[u8],
        public_key: KeyHandle,
        flags: u32,
    ) -> CspResult<()>;

    fn gen_random(&mut self, prov: ContainerHandle, len: usize) -> CspResult<Vec<u8>>;
}
