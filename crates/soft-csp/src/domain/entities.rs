//! # Provider Entities
//!
//! Key containers, key objects and hash objects as stored in the registries.
//!
//! Key and hash objects are generic over the algorithm context type supplied
//! by the primitive engine. All blobs they carry (SChannel randoms, HMAC pads,
//! PRF label and seed) are owned values, deep-copied by `Clone`.

use zeroize::Zeroize;

use crate::domain::algorithms::{AlgId, AlgorithmInfo, KeyClass, KeySpec, Personality};
use crate::domain::errors::{CspError, CspResult};
use crate::domain::flags::*;
use crate::domain::handles::{ContainerHandle, KeyHandle};

/// Largest digest buffer (room for the 104-byte key expansion).
pub const MAX_HASH_SIZE: usize = 104;
/// Largest symmetric key plus salt.
pub const MAX_KEY_SIZE: usize = 48;
/// Largest cipher block.
pub const MAX_BLOCK_SIZE: usize = 24;

// =============================================================================
// KEY CONTAINER
// =============================================================================

/// Where a container is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeysetScope {
    User,
    Machine,
}

impl KeysetScope {
    pub fn from_flags(flags: u32) -> Self {
        if flags & CRYPT_MACHINE_KEYSET != 0 {
            KeysetScope::Machine
        } else {
            KeysetScope::User
        }
    }
}

/// A key container: personality plus the two long-term key slots.
#[derive(Debug, Clone)]
pub struct KeyContainer {
    pub flags: u32,
    pub personality: Personality,
    pub name: String,
    pub provider_name: String,
    pub exchange_key: Option<KeyHandle>,
    pub signature_key: Option<KeyHandle>,
    pub(crate) enum_algs_cursor: Option<usize>,
    pub(crate) enum_containers_cursor: Option<usize>,
}

impl KeyContainer {
    pub fn new(name: String, flags: u32, personality: Personality, provider_name: String) -> Self {
        Self {
            flags,
            personality,
            name,
            provider_name,
            exchange_key: None,
            signature_key: None,
            enum_algs_cursor: None,
            enum_containers_cursor: None,
        }
    }

    /// Ephemeral containers are never persisted.
    pub fn is_verify_only(&self) -> bool {
        self.flags & CRYPT_VERIFYCONTEXT == CRYPT_VERIFYCONTEXT
    }

    pub fn scope(&self) -> KeysetScope {
        KeysetScope::from_flags(self.flags)
    }

    pub fn user_key(&self, spec: KeySpec) -> Option<KeyHandle> {
        match spec {
            KeySpec::KeyExchange => self.exchange_key,
            KeySpec::Signature => self.signature_key,
        }
    }

    /// Bind `key` into `spec`, returning the handle it replaced.
    pub fn bind_user_key(&mut self, spec: KeySpec, key: KeyHandle) -> Option<KeyHandle> {
        match spec {
            KeySpec::KeyExchange => self.exchange_key.replace(key),
            KeySpec::Signature => self.signature_key.replace(key),
        }
    }
}

// =============================================================================
// KEY OBJECT
// =============================================================================

/// Key state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Idle,
    Encrypting,
    Decrypting,
    /// TLS1 pre-master secret already turned into the master secret.
    MasterKey,
}

/// Chaining modes understood by the block transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Cbc,
    Ecb,
    Ofb,
    Cfb,
    Cts,
}

impl CipherMode {
    pub fn from_u32(value: u32) -> Option<CipherMode> {
        match value {
            CRYPT_MODE_CBC => Some(CipherMode::Cbc),
            CRYPT_MODE_ECB => Some(CipherMode::Ecb),
            CRYPT_MODE_OFB => Some(CipherMode::Ofb),
            CRYPT_MODE_CFB => Some(CipherMode::Cfb),
            CRYPT_MODE_CTS => Some(CipherMode::Cts),
            _ => None,
        }
    }
}

/// Per-use algorithm descriptor set on a master key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SChannelAlg {
    pub usage: u32,
    pub alg: u32,
    pub bits: u32,
    pub flags: u32,
    pub reserved: u32,
}

/// SChannel handshake state carried by master keys.
#[derive(Debug, Clone, Default)]
pub struct SChannelInfo {
    pub enc_alg: SChannelAlg,
    pub mac_alg: SChannelAlg,
    pub client_random: Vec<u8>,
    pub server_random: Vec<u8>,
}

/// A symmetric, RSA or master-secret key.
#[derive(Debug, Clone)]
pub struct KeyObject<K> {
    pub alg: AlgId,
    pub container: ContainerHandle,
    pub mode: u32,
    pub mode_bits: u32,
    pub permissions: u32,
    pub key_len: usize,
    pub salt_len: usize,
    pub block_len: usize,
    pub state: KeyState,
    pub key_value: [u8; MAX_KEY_SIZE],
    pub init_vector: [u8; MAX_BLOCK_SIZE],
    pub chain_vector: [u8; MAX_BLOCK_SIZE],
    pub schannel: SChannelInfo,
    pub context: K,
}

/// Storage length in bits for a requested length, or `BadFlags`.
///
/// A zero request takes the table default. DES variants accept their
/// effective length and widen it to the parity-inclusive storage length.
pub fn resolve_key_bits(info: &AlgorithmInfo, requested: u32) -> CspResult<u32> {
    let bits = if requested == 0 { info.default_bits } else { requested };
    let widen = |effective: u32, storage: u32| {
        let bits = if bits == effective { storage } else { bits };
        if bits == storage {
            Ok(bits)
        } else {
            Err(CspError::BadFlags(bits << 16))
        }
    };
    match info.alg {
        AlgId::DES => widen(56, 64),
        AlgId::DES3_112 => widen(112, 128),
        AlgId::DES3 => widen(168, 192),
        _ if bits % 8 != 0 || bits > info.max_bits || bits < info.min_bits => {
            Err(CspError::BadFlags(bits << 16))
        }
        _ => Ok(bits),
    }
}

impl<K: Default> KeyObject<K> {
    /// New idle key. The key length is packed in the upper 16 bits of `flags`.
    pub fn new(container: ContainerHandle, info: &AlgorithmInfo, flags: u32) -> CspResult<Self> {
        let alg = info.alg;
        let bits = resolve_key_bits(info, flags >> 16)?;
        let key_len = (bits / 8) as usize;

        let (block_len, mode) = match alg {
            AlgId::RC2 | AlgId::DES | AlgId::DES3_112 | AlgId::DES3 => (8, CRYPT_MODE_CBC),
            AlgId::RSA_SIGN | AlgId::RSA_KEYX => (key_len, 0),
            _ => (0, 0),
        };

        if alg.key_class() != Some(KeyClass::Rsa) && key_len > MAX_KEY_SIZE {
            return Err(CspError::BadFlags(flags));
        }

        let salt_len = if flags & CRYPT_CREATE_SALT != 0 || (bits == 40 && flags & CRYPT_NO_SALT == 0)
        {
            16usize.saturating_sub(key_len)
        } else {
            0
        };

        Ok(Self {
            alg,
            container,
            mode,
            mode_bits: 0,
            permissions: CRYPT_ENCRYPT | CRYPT_DECRYPT | CRYPT_READ | CRYPT_WRITE | CRYPT_MAC,
            key_len,
            salt_len,
            block_len,
            state: KeyState::Idle,
            key_value: [0; MAX_KEY_SIZE],
            init_vector: [0; MAX_BLOCK_SIZE],
            chain_vector: [0; MAX_BLOCK_SIZE],
            schannel: SChannelInfo::default(),
            context: K::default(),
        })
    }
}

impl<K> KeyObject<K> {
    /// Key bytes followed by salt bytes.
    pub fn keying_material(&self) -> &[u8] {
        let end = (self.key_len + self.salt_len).min(MAX_KEY_SIZE);
        &self.key_value[..end]
    }

    pub fn key_bytes(&self) -> &[u8] {
        &self.key_value[..self.key_len.min(MAX_KEY_SIZE)]
    }

    pub fn salt_bytes(&self) -> &[u8] {
        let start = self.key_len.min(MAX_KEY_SIZE);
        &self.key_value[start..self.keying_material().len()]
    }

    /// Copy `material` in as the key bytes (truncated to storage).
    pub fn set_key_bytes(&mut self, material: &[u8]) {
        let len = material.len().min(MAX_KEY_SIZE);
        self.key_value[..len].copy_from_slice(&material[..len]);
    }

    /// Back to idle with the chaining vector reloaded from the IV.
    pub fn reset_chain(&mut self) {
        self.state = KeyState::Idle;
        self.chain_vector = self.init_vector;
    }
}

impl<K> Drop for KeyObject<K> {
    fn drop(&mut self) {
        self.key_value.zeroize();
    }
}

// =============================================================================
// HASH OBJECT
// =============================================================================

/// Hash state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashState {
    Idle,
    Hashing,
    Finished,
}

pub const HMAC_PAD_LEN: usize = 64;
const HMAC_IPAD: u8 = 0x36;
const HMAC_OPAD: u8 = 0x5c;

/// HMAC parameters: inner hash algorithm and the two pad strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HmacInfo {
    pub hash_alg: AlgId,
    pub inner: Vec<u8>,
    pub outer: Vec<u8>,
}

impl HmacInfo {
    /// Empty pad strings default to 64 bytes of 0x36 / 0x5c.
    pub fn new(hash_alg: AlgId, inner: &[u8], outer: &[u8]) -> Self {
        let pad = |given: &[u8], fill: u8| {
            if given.is_empty() {
                vec![fill; HMAC_PAD_LEN]
            } else {
                given.to_vec()
            }
        };
        Self {
            hash_alg,
            inner: pad(inner, HMAC_IPAD),
            outer: pad(outer, HMAC_OPAD),
        }
    }

    /// XOR key bytes into both pads, up to the shorter length.
    pub fn mix_key(&mut self, key: &[u8]) {
        for (pad, k) in self.inner.iter_mut().zip(key) {
            *pad ^= k;
        }
        for (pad, k) in self.outer.iter_mut().zip(key) {
            *pad ^= k;
        }
    }
}

/// Label and seed consumed when a TLS1 PRF hash is read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tls1PrfParams {
    pub label: Vec<u8>,
    pub seed: Vec<u8>,
}

/// A hash object.
#[derive(Debug, Clone)]
pub struct HashObject<H> {
    pub alg: AlgId,
    pub container: ContainerHandle,
    pub key: Option<KeyHandle>,
    pub hash_size: usize,
    pub state: HashState,
    pub context: Option<H>,
    pub value: [u8; MAX_HASH_SIZE],
    pub hmac: Option<HmacInfo>,
    pub prf: Tls1PrfParams,
}

impl<H> HashObject<H> {
    pub fn new(
        alg: AlgId,
        container: ContainerHandle,
        key: Option<KeyHandle>,
        hash_size: usize,
    ) -> Self {
        Self {
            alg,
            container,
            key,
            hash_size: hash_size.min(MAX_HASH_SIZE),
            state: HashState::Idle,
            context: None,
            value: [0; MAX_HASH_SIZE],
            hmac: None,
            prf: Tls1PrfParams::default(),
        }
    }

    pub fn digest(&self) -> &[u8] {
        &self.value[..self.hash_size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::algorithms::Personality;

    fn container() -> ContainerHandle {
        ContainerHandle::from_raw(1)
    }

    fn key(alg: AlgId, personality: Personality, flags: u32) -> CspResult<KeyObject<()>> {
        let info = personality.require(alg)?;
        KeyObject::new(container(), info, flags)
    }

    #[test]
    fn test_des_lengths_normalized() {
        let k = key(AlgId::DES, Personality::Base, 56 << 16).unwrap();
        assert_eq!(k.key_len, 8);
        assert_eq!(k.block_len, 8);
        assert_eq!(k.mode, CRYPT_MODE_CBC);
        assert_eq!(key(AlgId::DES, Personality::Base, 64 << 16).unwrap().key_len, 8);
        assert!(matches!(
            key(AlgId::DES, Personality::Base, 40 << 16),
            Err(CspError::BadFlags(_))
        ));
        assert_eq!(key(AlgId::DES3_112, Personality::Strong, 0).unwrap().key_len, 16);
        assert_eq!(key(AlgId::DES3, Personality::Strong, 168 << 16).unwrap().key_len, 24);
        assert!(key(AlgId::DES3, Personality::Strong, 128 << 16).is_err());
    }

    #[test]
    fn test_length_bounds_and_alignment() {
        assert!(matches!(
            key(AlgId::RC4, Personality::Base, 64 << 16),
            Err(CspError::BadFlags(_))
        ));
        assert!(matches!(
            key(AlgId::RC2, Personality::Strong, 60 << 16),
            Err(CspError::BadFlags(_))
        ));
        assert!(key(AlgId::RC4, Personality::Strong, 128 << 16).is_ok());
    }

    #[test]
    fn test_forty_bit_keys_get_salt() {
        let k = key(AlgId::RC4, Personality::Base, 0).unwrap();
        assert_eq!(k.key_len, 5);
        assert_eq!(k.salt_len, 11);
        assert_eq!(k.block_len, 0);
        assert_eq!(k.keying_material().len(), 16);

        let unsalted = key(AlgId::RC4, Personality::Base, (40 << 16) | CRYPT_NO_SALT).unwrap();
        assert_eq!(unsalted.salt_len, 0);

        let salted = key(AlgId::RC2, Personality::Strong, (56 << 16) | CRYPT_CREATE_SALT).unwrap();
        assert_eq!(salted.salt_len, 9);
    }

    #[test]
    fn test_rsa_block_len_is_modulus_bytes() {
        let k = key(AlgId::RSA_KEYX, Personality::Base, 0).unwrap();
        assert_eq!(k.key_len, 64);
        assert_eq!(k.block_len, 64);
        assert_eq!(k.mode, 0);
    }

    #[test]
    fn test_reset_chain_reloads_iv() {
        let mut k = key(AlgId::DES, Personality::Base, 0).unwrap();
        k.init_vector[..8].copy_from_slice(&[7; 8]);
        k.chain_vector[..8].copy_from_slice(&[1; 8]);
        k.state = KeyState::Encrypting;
        k.reset_chain();
        assert_eq!(k.state, KeyState::Idle);
        assert_eq!(&k.chain_vector[..8], &[7; 8]);
    }

    #[test]
    fn test_hmac_info_defaults_and_mixing() {
        let mut info = HmacInfo::new(AlgId::MD5, &[], &[]);
        assert_eq!(info.inner, vec![0x36; 64]);
        assert_eq!(info.outer, vec![0x5c; 64]);
        info.mix_key(&[0xff, 0x00]);
        assert_eq!(info.inner[0], 0x36 ^ 0xff);
        assert_eq!(info.inner[1], 0x36);
        assert_eq!(info.outer[0], 0x5c ^ 0xff);

        let custom = HmacInfo::new(AlgId::SHA, &[1, 2], &[]);
        assert_eq!(custom.inner, vec![1, 2]);
    }

    #[test]
    fn test_container_binding_returns_previous() {
        let mut c = KeyContainer::new("c".into(), 0, Personality::Base, String::new());
        let first = KeyHandle::from_raw(10);
        let second = KeyHandle::from_raw(11);
        assert_eq!(c.bind_user_key(KeySpec::Signature, first), None);
        assert_eq!(c.bind_user_key(KeySpec::Signature, second), Some(first));
        assert_eq!(c.user_key(KeySpec::Signature), Some(second));
        assert_eq!(c.user_key(KeySpec::KeyExchange), None);
    }
}
