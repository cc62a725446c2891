//! # Key Objects
//!
//! Creation, generation, derivation and parameters of key objects, plus the
//! long-term key slots of a container.

use zeroize::Zeroizing;

use super::*;
use crate::domain::algorithms::{AlgId, KeySpec, ALG_CLASS_DATA_ENCRYPT, ALG_CLASS_MSG_ENCRYPT};
use crate::domain::entities::{HashState, MAX_BLOCK_SIZE, MAX_KEY_SIZE};
use crate::domain::flags::*;
use crate::domain::tls1::KeyExpansionLayout;
use crate::ports::inbound::{KeyParam, ParamInput, ParamValue};

const DERIVE_PAD_LEN: usize = 64;

/// Reset a key to idle and reschedule it from its raw bytes.
///
/// Required after every change of key material and after every final
/// transform.
pub(super) fn setup_key<E: PrimitiveEngine>(engine: &E, key: &mut Key<E>) -> CspResult<()> {
    key.reset_chain();
    let material = Zeroizing::new(key.keying_material().to_vec());
    engine.setup_key(key.alg, &mut key.context, key.key_len, key.salt_len, &material)
}

impl<E, S> CryptoProvider<E, S>
where
    E: PrimitiveEngine,
    S: KeysetStore,
{
    /// New idle key of `alg` under `prov`, without key material.
    pub(super) fn new_key(&mut self, prov: ContainerHandle, alg: AlgId, flags: u32) -> CspResult<KeyHandle> {
        let info = self.container(prov)?.personality.require(alg)?;
        let key = KeyObject::new(prov, info, flags)?;
        self.keys.create(key)
    }

    /// Run `fill` on a freshly created key; the key is released if it fails.
    pub(super) fn complete_key<F>(&mut self, handle: KeyHandle, fill: F) -> CspResult<KeyHandle>
    where
        F: FnOnce(&E, &mut Key<E>) -> CspResult<()>,
    {
        let engine = &self.engine;
        let result = match self.keys.get_mut(handle) {
            Ok(key) => fill(engine, key),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => Ok(handle),
            Err(e) => {
                let _ = self.keys.release(handle);
                Err(e)
            }
        }
    }

    /// Bind a new reference to `key` into the container slot.
    fn install_user_key(&mut self, prov: ContainerHandle, spec: KeySpec, key: KeyHandle) -> CspResult<()> {
        let copy = self.keys.copy_reference(key)?;
        let previous = self.containers.get_mut(prov)?.bind_user_key(spec, copy);
        if let Some(old) = previous {
            let _ = self.keys.release(old);
        }
        Ok(())
    }

    // =========================================================================
    // GENERATION
    // =========================================================================

    pub(super) fn generate_key(&mut self, prov: ContainerHandle, alg: AlgId, flags: u32) -> CspResult<KeyHandle> {
        let slot = match alg.0 {
            KeySpec::AT_SIGNATURE => Some(KeySpec::Signature),
            KeySpec::AT_KEYEXCHANGE => Some(KeySpec::KeyExchange),
            _ => None,
        };

        match (slot, alg) {
            (Some(spec), _) => {
                let handle = self.generate_key_pair(prov, spec.alg_id(), flags)?;
                self.install_user_key(prov, spec, handle)?;
                Ok(handle)
            }
            (None, AlgId::RSA_SIGN | AlgId::RSA_KEYX) => self.generate_key_pair(prov, alg, flags),
            (
                None,
                AlgId::RC2
                | AlgId::RC4
                | AlgId::DES
                | AlgId::DES3_112
                | AlgId::DES3
                | AlgId::PCT1_MASTER
                | AlgId::SSL2_MASTER
                | AlgId::SSL3_MASTER
                | AlgId::TLS1_MASTER,
            ) => {
                let mut random = Zeroizing::new(self.random_bytes(MAX_KEY_SIZE)?);
                match alg {
                    AlgId::SSL3_MASTER => random[..2].copy_from_slice(&[0x03, 0x00]),
                    AlgId::TLS1_MASTER => random[..2].copy_from_slice(&[0x03, 0x01]),
                    _ => {}
                }
                let handle = self.new_key(prov, alg, flags)?;
                self.complete_key(handle, |engine, key| {
                    key.key_value.copy_from_slice(&random);
                    setup_key(engine, key)
                })
            }
            _ => Err(CspError::BadAlgorithm(alg.0)),
        }
    }

    fn generate_key_pair(&mut self, prov: ContainerHandle, alg: AlgId, flags: u32) -> CspResult<KeyHandle> {
        let exponent = self.config.rsa_public_exponent;
        let handle = self.new_key(prov, alg, flags)?;
        let handle = self.complete_key(handle, |engine, key| {
            engine.new_key_pair(&mut key.context, key.key_len * 8, exponent)?;
            setup_key(engine, key)
        })?;

        #[cfg(feature = "tracing-log")]
        tracing::info!(
            "[csp] generated {}-bit RSA pair ({})",
            self.keys.get(handle).map(|k| k.key_len * 8).unwrap_or(0),
            alg
        );

        Ok(handle)
    }

    // =========================================================================
    // DERIVATION
    // =========================================================================

    pub(super) fn derive_session_key(
        &mut self,
        prov: ContainerHandle,
        alg: AlgId,
        base: HashHandle,
        flags: u32,
    ) -> CspResult<KeyHandle> {
        let hash = self.hash(base)?;
        match alg.class() {
            ALG_CLASS_DATA_ENCRYPT => {
                let handle = self.new_key(prov, alg, flags)?;
                let material = match self.derivation_material(base, handle) {
                    Ok(material) => material,
                    Err(e) => {
                        let _ = self.keys.release(handle);
                        return Err(e);
                    }
                };
                self.complete_key(handle, |engine, key| {
                    key.set_key_bytes(&material);
                    setup_key(engine, key)
                })
            }
            ALG_CLASS_MSG_ENCRYPT => {
                let master = hash
                    .key
                    .and_then(|k| self.keys.get(k).ok())
                    .ok_or_else(|| CspError::Failure("hash has no master key".to_string()))?;
                let info = master.schannel.clone();
                let expansion = hash.value;
                let server = flags & CRYPT_SERVER != 0;
                let low_flags = flags & 0xffff;
                let mac_len = (info.mac_alg.bits / 8) as usize;

                match alg {
                    AlgId::SCHANNEL_ENC_KEY => {
                        let enc_alg = AlgId(info.enc_alg.alg);
                        let handle =
                            self.new_key(prov, enc_alg, (info.enc_alg.bits << 16) | low_flags)?;
                        self.complete_key(handle, |engine, key| {
                            let layout = KeyExpansionLayout {
                                mac_len,
                                enc_len: (info.enc_alg.bits / 8) as usize,
                                block_len: key.block_len.min(MAX_BLOCK_SIZE),
                            };
                            key.set_key_bytes(&expansion[layout.enc_key(server)?]);
                            let iv = &expansion[layout.iv(server)?];
                            key.init_vector[..iv.len()].copy_from_slice(iv);
                            setup_key(engine, key)
                        })
                    }
                    AlgId::SCHANNEL_MAC_KEY => {
                        let handle =
                            self.new_key(prov, alg, (info.mac_alg.bits << 16) | low_flags)?;
                        self.complete_key(handle, |engine, key| {
                            let layout = KeyExpansionLayout {
                                mac_len,
                                enc_len: 0,
                                block_len: 0,
                            };
                            key.set_key_bytes(&expansion[layout.mac_key(server)?]);
                            setup_key(engine, key)
                        })
                    }
                    other => Err(CspError::BadAlgorithm(other.0)),
                }
            }
            _ => Err(CspError::BadAlgorithm(alg.0)),
        }
    }

    /// Exactly `key_len` key bytes for a data-encryption key derived from
    /// `base`. The salt is never taken from the digest.
    ///
    /// A digest shorter than the key is stretched by hashing the digest
    /// XORed into 64-byte 0x36 and 0x5c buffers and concatenating both.
    fn derivation_material(&mut self, base: HashHandle, key: KeyHandle) -> CspResult<Zeroizing<Vec<u8>>> {
        let key_len = self.key(key)?.key_len;
        let digest = Zeroizing::new(self.hash_value(base)?);
        if digest.len() >= key_len {
            let mut material = digest;
            material.truncate(key_len);
            return Ok(material);
        }

        let mut pad1 = [0x36u8; DERIVE_PAD_LEN];
        let mut pad2 = [0x5cu8; DERIVE_PAD_LEN];
        for (i, byte) in digest.iter().take(DERIVE_PAD_LEN).enumerate() {
            pad1[i] ^= byte;
            pad2[i] ^= byte;
        }

        let saved = self.hash(base)?.value;
        let mut material = Zeroizing::new(self.rehash(base, &pad1)?);
        material.extend_from_slice(&self.rehash(base, &pad2)?);
        self.hash_mut(base)?.value = saved;

        material.resize(key_len, 0);
        Ok(material)
    }

    /// Digest `data` with a fresh run of the hash object's own algorithm.
    fn rehash(&mut self, hash: HashHandle, data: &[u8]) -> CspResult<Vec<u8>> {
        self.reset_hash(hash)?;
        self.update_hash_object(hash, data)?;
        self.finalize_hash_object(hash)?;
        let hash = self.hash_mut(hash)?;
        hash.state = HashState::Finished;
        Ok(hash.digest().to_vec())
    }

    // =========================================================================
    // HANDLES
    // =========================================================================

    pub(super) fn user_key(&mut self, prov: ContainerHandle, key_spec: u32) -> CspResult<KeyHandle> {
        let spec = KeySpec::from_u32(key_spec).ok_or(CspError::NoKey)?;
        let bound = self.container(prov)?.user_key(spec).ok_or(CspError::NoKey)?;
        self.keys.copy_reference(bound).map_err(|_| CspError::NoKey)
    }

    pub(super) fn release_key(&mut self, key: KeyHandle) -> CspResult<()> {
        self.keys.release(key).map(|_| ())
    }

    pub(super) fn clone_key(&mut self, key: KeyHandle, reserved: u32, flags: u32) -> CspResult<KeyHandle> {
        let copy = self.key(key)?.clone();
        if reserved != 0 || flags != 0 {
            return Err(CspError::InvalidParameter);
        }
        self.keys.create(copy)
    }

    // =========================================================================
    // PARAMETERS
    // =========================================================================

    pub(super) fn key_param(
        &self,
        key: KeyHandle,
        param: KeyParam,
        buffer_len: usize,
        flags: u32,
    ) -> CspResult<ParamValue> {
        if flags != 0 {
            return Err(CspError::BadFlags(flags));
        }
        let key = self.key(key)?;
        let value = match param {
            KeyParam::Iv => {
                ParamValue::Bytes(key.init_vector[..key.block_len.min(MAX_BLOCK_SIZE)].to_vec())
            }
            KeyParam::Salt => ParamValue::Bytes(key.salt_bytes().to_vec()),
            KeyParam::KeyLen => ParamValue::Dword((key.key_len * 8) as u32),
            KeyParam::BlockLen => ParamValue::Dword((key.block_len * 8) as u32),
            KeyParam::Mode => ParamValue::Dword(key.mode),
            KeyParam::ModeBits => ParamValue::Dword(key.mode_bits),
            KeyParam::Permissions => ParamValue::Dword(key.permissions),
            KeyParam::AlgId => ParamValue::Dword(key.alg.0),
            KeyParam::SChannelAlg | KeyParam::ClientRandom | KeyParam::ServerRandom => {
                return Err(CspError::BadType(param.id()))
            }
        };
        value.fit(buffer_len)
    }

    pub(super) fn store_key_param(
        &mut self,
        handle: KeyHandle,
        param: KeyParam,
        value: ParamInput<'_>,
        flags: u32,
    ) -> CspResult<()> {
        if flags != 0 {
            return Err(CspError::BadFlags(flags));
        }
        let engine = &self.engine;
        let key = self.keys.get_mut(handle)?;
        match (param, value) {
            (KeyParam::Mode, ParamInput::Dword(mode)) => key.mode = mode,
            (KeyParam::ModeBits, ParamInput::Dword(bits)) => key.mode_bits = bits,
            (KeyParam::Permissions, ParamInput::Dword(permissions)) => key.permissions = permissions,
            (KeyParam::Iv, ParamInput::Bytes(iv)) => {
                let len = key.block_len.min(MAX_BLOCK_SIZE);
                let iv = iv.get(..len).ok_or(CspError::BadData("IV shorter than the block"))?;
                key.init_vector[..len].copy_from_slice(iv);
                setup_key(engine, key)?;
            }
            (KeyParam::SChannelAlg, ParamInput::SChannelAlg(alg)) => match alg.usage {
                SCHANNEL_ENC_KEY => key.schannel.enc_alg = alg,
                SCHANNEL_MAC_KEY => key.schannel.mac_alg = alg,
                other => return Err(CspError::Failure(format!("unknown SChannel use {other}"))),
            },
            (KeyParam::ClientRandom, ParamInput::Bytes(random)) => {
                key.schannel.client_random = random.to_vec()
            }
            (KeyParam::ServerRandom, ParamInput::Bytes(random)) => {
                key.schannel.server_random = random.to_vec()
            }
            (
                KeyParam::Salt | KeyParam::AlgId | KeyParam::BlockLen | KeyParam::KeyLen,
                _,
            ) => return Err(CspError::BadType(param.id())),
            _ => return Err(CspError::InvalidParameter),
        }
        Ok(())
    }
}

