//! # Signatures
//!
//! PKCS#1 block type 1 (or X9.31) signatures over a hash object's value.

use super::*;
use crate::domain::algorithms::{KeyClass, KeySpec};
use crate::domain::flags::{CRYPT_NOHASHOID, CRYPT_X931_FORMAT};
use crate::domain::padding::build_signature_block;
use crate::ports::outbound::{Direction, RsaExponent};

const SIGNATURE_FLAGS: u32 = CRYPT_NOHASHOID | CRYPT_X931_FORMAT;

impl<E, S> CryptoProvider<E, S>
where
    E: PrimitiveEngine,
    S: KeysetStore,
{
    /// Sign with the private key bound in the container's `key_spec` slot.
    pub(super) fn sign(
        &mut self,
        prov: ContainerHandle,
        hash: HashHandle,
        key_spec: u32,
        flags: u32,
        buffer_len: usize,
    ) -> CspResult<Vec<u8>> {
        if flags & !SIGNATURE_FLAGS != 0 {
            return Err(CspError::BadFlags(flags));
        }
        let spec = KeySpec::from_u32(key_spec).ok_or(CspError::NoKey)?;
        let key = self.container(prov)?.user_key(spec).ok_or(CspError::NoKey)?;
        let key_len = self.keys.get(key).map_err(|_| CspError::NoKey)?.key_len;
        ensure_capacity(buffer_len, key_len)?;

        let alg = self.hash(hash)?.alg;
        let digest = self.hash_value(hash)?;
        let block = build_signature_block(key_len, alg, &digest, flags)?;

        let signer = self.keys.get(key).map_err(|_| CspError::NoKey)?;
        self.engine
            .rsa_block(&signer.context, &block, Direction::Encrypt, RsaExponent::Private)
    }

    /// Check `signature` over the hash value with `public_key`.
    pub(super) fn verify(
        &mut self,
        hash: HashHandle,
        signature: &[u8],
        public_key: KeyHandle,
        flags: u32,
    ) -> CspResult<()> {
        if flags & !SIGNATURE_FLAGS != 0 {
            return Err(CspError::BadFlags(flags));
        }
        let key = self.key(public_key)?;
        if key.alg.key_class() != Some(KeyClass::Rsa) {
            return Err(CspError::BadKey("not an RSA key"));
        }
        if signature.len() != key.block_len {
            return Err(CspError::BadSignature);
        }

        let alg = self.hash(hash)?.alg;
        let digest = self.hash_value(hash)?;

        let key = self.key(public_key)?;
        let recovered = self
            .engine
            .rsa_block(&key.context, signature, Direction::Decrypt, RsaExponent::Public)
            .map_err(|e| match e {
                CspError::BadData(_) => CspError::BadSignature,
                other => other,
            })?;
        let expected = build_signature_block(signature.len(), alg, &digest, flags)?;

        if recovered != expected {
            #[cfg(feature = "tracing-log")]
            tracing::warn!("[csp] signature mismatch for {} digest", alg);
            return Err(CspError::BadSignature);
        }
        Ok(())
    }
}
