//! # Hash Objects
//!
//! Plain digests, CBC-MAC over a block key, HMAC over a plain digest, and
//! the two TLS1 hash objects (PRF and SChannel master hash).
//!
//! ## State machine
//!
//! `Idle -> Hashing` on the first data, `Hashing -> Finished` when the value
//! is read. Finished hashes accept no more data until the value is set
//! explicitly.

use super::*;
use crate::domain::algorithms::{AlgId, HashClass, ALG_CLASS_DATA_ENCRYPT, ALG_TYPE_BLOCK};
use crate::domain::entities::{HashState, HmacInfo, KeyState};
use crate::domain::errors::HandleKind;
use crate::domain::flags::CRYPT_LITTLE_ENDIAN;
use crate::ports::inbound::{HashParam, ParamInput, ParamValue};

impl<E, S> CryptoProvider<E, S>
where
    E: PrimitiveEngine,
    S: KeysetStore,
{
    pub(super) fn new_hash(
        &mut self,
        prov: ContainerHandle,
        alg: AlgId,
        key: Option<KeyHandle>,
        flags: u32,
    ) -> CspResult<HashHandle> {
        let info = self
            .container(prov)?
            .personality
            .lookup(alg)
            .ok_or(CspError::BadAlgorithm(alg.0))?;
        if flags != 0 {
            return Err(CspError::BadFlags(flags));
        }
        let class = alg.hash_class().ok_or(CspError::BadAlgorithm(alg.0))?;

        if matches!(
            class,
            HashClass::Mac | HashClass::Hmac | HashClass::SchannelMaster | HashClass::Tls1Prf
        ) {
            let bound = key
                .and_then(|k| self.keys.get(k).ok())
                .ok_or(CspError::BadHandle(HandleKind::Key))?;
            if class == HashClass::Mac && bound.alg.alg_type() != ALG_TYPE_BLOCK {
                return Err(CspError::BadKey("MAC needs a block cipher key"));
            }
            if matches!(class, HashClass::SchannelMaster | HashClass::Tls1Prf)
                && bound.alg != AlgId::TLS1_MASTER
            {
                return Err(CspError::BadKey("TLS1 hashes need a TLS1 master key"));
            }
            if class == HashClass::Tls1Prf && bound.state != KeyState::MasterKey {
                return Err(CspError::BadKeyState);
            }
        }

        let object = HashObject::new(alg, prov, key, (info.default_bits / 8) as usize);
        let handle = self.hashes.create(object)?;

        if let Err(e) = self.prime_hash(handle, class, key) {
            let _ = self.hashes.release(handle);
            return Err(e);
        }
        Ok(handle)
    }

    /// SChannel master hashes carry the key expansion as their value.
    fn prime_hash(&mut self, hash: HashHandle, class: HashClass, key: Option<KeyHandle>) -> CspResult<()> {
        if let (HashClass::SchannelMaster, Some(master)) = (class, key) {
            let expansion = self.key_expansion(master)?;
            self.hash_mut(hash)?.value.copy_from_slice(&expansion);
        }
        self.reset_hash(hash)
    }

    /// Feed data; the hash must be idle or already hashing.
    pub(super) fn feed_hash(&mut self, hash: HashHandle, data: &[u8], flags: u32) -> CspResult<()> {
        if flags != 0 {
            return Err(CspError::BadFlags(flags));
        }
        let object = self.hash(hash)?;
        let alg = object.alg;
        let personality = self.container(object.container)?.personality;
        if personality.lookup(alg).is_none() || alg == AlgId::SSL3_SHAMD5 {
            return Err(CspError::BadAlgorithm(alg.0));
        }

        let object = self.hash_mut(hash)?;
        if object.state == HashState::Idle {
            object.state = HashState::Hashing;
        }
        if object.state != HashState::Hashing {
            return Err(CspError::BadHashState);
        }
        self.update_hash_object(hash, data)
    }

    /// Feed the key bytes of a data-encryption key, most significant first
    /// unless `CRYPT_LITTLE_ENDIAN` is set.
    pub(super) fn feed_session_key(&mut self, hash: HashHandle, key: KeyHandle, flags: u32) -> CspResult<()> {
        let key = self.key(key)?;
        if key.alg.class() != ALG_CLASS_DATA_ENCRYPT {
            return Err(CspError::BadKey("not a session key"));
        }
        if flags & !CRYPT_LITTLE_ENDIAN != 0 {
            return Err(CspError::BadFlags(flags));
        }

        let mut bytes = zeroize::Zeroizing::new(key.key_bytes().to_vec());
        if flags & CRYPT_LITTLE_ENDIAN == 0 {
            bytes.reverse();
        }
        self.feed_hash(hash, &bytes, 0)
    }

    pub(super) fn release_hash(&mut self, hash: HashHandle) -> CspResult<()> {
        self.hashes.release(hash).map(|_| ())
    }

    pub(super) fn clone_hash(&mut self, hash: HashHandle, reserved: u32, flags: u32) -> CspResult<HashHandle> {
        let copy = self.hash(hash)?.clone();
        if reserved != 0 || flags != 0 {
            return Err(CspError::InvalidParameter);
        }
        self.hashes.create(copy)
    }

    // =========================================================================
    // PARAMETERS
    // =========================================================================

    pub(super) fn hash_param(
        &mut self,
        hash: HashHandle,
        param: HashParam,
        buffer_len: usize,
        flags: u32,
    ) -> CspResult<ParamValue> {
        if flags != 0 {
            return Err(CspError::BadFlags(flags));
        }
        let object = self.hash(hash)?;
        match param {
            HashParam::AlgId => ParamValue::Dword(object.alg.0).fit(buffer_len),
            HashParam::HashSize => ParamValue::Dword(object.hash_size as u32).fit(buffer_len),
            HashParam::HashValue if object.alg == AlgId::TLS1PRF => {
                Ok(ParamValue::Bytes(self.prf_output(hash, buffer_len)?))
            }
            HashParam::HashValue => {
                if object.state == HashState::Idle {
                    return Err(CspError::BadHashState);
                }
                ensure_capacity(buffer_len, object.hash_size)?;
                Ok(ParamValue::Bytes(self.hash_value(hash)?))
            }
            other => Err(CspError::BadType(other.id())),
        }
    }

    pub(super) fn store_hash_param(
        &mut self,
        hash: HashHandle,
        param: HashParam,
        value: ParamInput<'_>,
        flags: u32,
    ) -> CspResult<()> {
        if flags != 0 {
            return Err(CspError::BadFlags(flags));
        }
        let object = self.hash(hash)?;
        match (param, value) {
            (HashParam::HmacInfo, ParamInput::HmacInfo { hash_alg, inner, outer }) => {
                let mut info = HmacInfo::new(hash_alg, inner, outer);
                let key = object
                    .key
                    .and_then(|k| self.keys.get(k).ok())
                    .ok_or_else(|| CspError::Failure("HMAC hash has no key".to_string()))?;
                info.mix_key(key.key_bytes());
                self.hash_mut(hash)?.hmac = Some(info);
                self.reset_hash(hash)
            }
            (HashParam::HashValue, ParamInput::Bytes(value)) => {
                let object = self.hash_mut(hash)?;
                let len = object.hash_size;
                let value = value
                    .get(..len)
                    .ok_or(CspError::BadData("hash value shorter than the hash size"))?;
                object.value[..len].copy_from_slice(value);
                object.state = HashState::Finished;
                Ok(())
            }
            (HashParam::Tls1PrfLabel, ParamInput::Bytes(label)) => {
                self.hash_mut(hash)?.prf.label = label.to_vec();
                Ok(())
            }
            (HashParam::Tls1PrfSeed, ParamInput::Bytes(seed)) => {
                self.hash_mut(hash)?.prf.seed = seed.to_vec();
                Ok(())
            }
            (HashParam::AlgId | HashParam::HashSize, _) => Err(CspError::BadType(param.id())),
            _ => Err(CspError::InvalidParameter),
        }
    }

    // =========================================================================
    // DIGEST DRIVERS
    // =========================================================================

    /// Finalize if still hashing and return the value.
    pub(super) fn hash_value(&mut self, hash: HashHandle) -> CspResult<Vec<u8>> {
        match self.hash(hash)?.state {
            HashState::Idle => return Err(CspError::BadHashState),
            HashState::Hashing => {
                self.finalize_hash_object(hash)?;
                self.hash_mut(hash)?.state = HashState::Finished;
            }
            HashState::Finished => {}
        }
        Ok(self.hash(hash)?.digest().to_vec())
    }

    /// Start a fresh digest run for the hash object's algorithm.
    pub(super) fn reset_hash(&mut self, hash: HashHandle) -> CspResult<()> {
        let object = self.hash(hash)?;
        match object.alg.hash_class() {
            Some(HashClass::Hmac) => {
                let Some(info) = object.hmac.clone() else {
                    return Ok(());
                };
                let personality = self.container(object.container)?.personality;
                let hash_size = (personality.require(info.hash_alg)?.default_bits / 8) as usize;
                let mut ctx = self.engine.init_hash(info.hash_alg)?;
                self.engine.update_hash(&mut ctx, &info.inner);
                let object = self.hash_mut(hash)?;
                object.hash_size = hash_size;
                object.context = Some(ctx);
            }
            Some(HashClass::Mac) => {
                let key = object.key.ok_or(CspError::BadHandle(HandleKind::Key))?;
                let block_len = self.key(key)?.block_len;
                self.hash_mut(hash)?.hash_size = block_len;
            }
            Some(HashClass::Plain) => {
                let ctx = self.engine.init_hash(object.alg)?;
                self.hash_mut(hash)?.context = Some(ctx);
            }
            _ => {}
        }
        Ok(())
    }

    pub(super) fn update_hash_object(&mut self, hash: HashHandle, data: &[u8]) -> CspResult<()> {
        let object = self.hash(hash)?;
        if object.alg == AlgId::MAC {
            let key = object.key.ok_or(CspError::BadHandle(HandleKind::Key))?;
            self.encrypt_data(key, None, false, 0, data, data.len())?;
            return Ok(());
        }

        let engine = &self.engine;
        if let Some(ctx) = self.hashes.get_mut(hash)?.context.as_mut() {
            engine.update_hash(ctx, data);
        }
        Ok(())
    }

    /// Write the final digest into the value buffer.
    pub(super) fn finalize_hash_object(&mut self, hash: HashHandle) -> CspResult<()> {
        let object = self.hash(hash)?;
        match object.alg.hash_class() {
            Some(HashClass::Hmac) => {
                let Some(info) = object.hmac.clone() else {
                    return Ok(());
                };
                let hash_size = object.hash_size;
                let Some(ctx) = self.hash_mut(hash)?.context.take() else {
                    return Ok(());
                };
                let inner = self.engine.finalize_hash(ctx);
                let inner = inner.get(..hash_size).unwrap_or(&inner[..]);

                let mut ctx = self.engine.init_hash(info.hash_alg)?;
                self.engine.update_hash(&mut ctx, &info.outer);
                self.engine.update_hash(&mut ctx, inner);
                let digest = self.engine.finalize_hash(ctx);
                store_digest(self.hash_mut(hash)?, &digest);
            }
            Some(HashClass::Mac) => {
                let key = object.key.ok_or(CspError::BadHandle(HandleKind::Key))?;
                let hash_size = object.hash_size;
                let tag = self.encrypt_data(key, None, true, 0, &[], hash_size)?;
                store_digest(self.hash_mut(hash)?, &tag);
            }
            Some(HashClass::Plain) => {
                if let Some(ctx) = self.hash_mut(hash)?.context.take() {
                    let digest = self.engine.finalize_hash(ctx);
                    store_digest(self.hash_mut(hash)?, &digest);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn store_digest<H>(object: &mut HashObject<H>, digest: &[u8]) {
    let len = digest.len().min(object.value.len());
    object.value[..len].copy_from_slice(&digest[..len]);
}
