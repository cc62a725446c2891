//! # Key Blobs
//!
//! Export and import of key objects in the classic blob layouts:
//!
//! | Blob | Body |
//! |------|------|
//! | SIMPLEBLOB | wrapping alg, RSA-encrypted PKCS#1 block |
//! | PUBLICKEYBLOB | RSA1 header, modulus |
//! | PRIVATEKEYBLOB | RSA2 header, modulus, CRT parts, private exponent |
//! | PLAINTEXTKEYBLOB | length, raw key bytes |

use zeroize::Zeroizing;

use super::keys::setup_key;
use super::*;
use crate::domain::algorithms::{
    AlgId, KeyClass, ALG_CLASS_DATA_ENCRYPT, ALG_CLASS_MSG_ENCRYPT,
};
use crate::domain::blob::{
    decode_plaintext_body, decode_private_body, decode_public_body, decode_simple_body,
    encode_plaintext_blob, encode_private_blob, encode_public_blob, encode_simple_blob,
    private_body_len, BlobHeader, BlobType,
};
use crate::domain::entities::MAX_KEY_SIZE;
use crate::domain::flags::CRYPT_SSL2_FALLBACK;
use crate::domain::padding;
use crate::ports::outbound::{Direction, RsaExponent};

const RSA_HEADER_LEN: usize = 12;

fn is_rsa(alg: AlgId) -> bool {
    matches!(alg, AlgId::RSA_SIGN | AlgId::RSA_KEYX)
}

impl<E, S> CryptoProvider<E, S>
where
    E: PrimitiveEngine,
    S: KeysetStore,
{
    pub(super) fn export_blob(
        &mut self,
        key: KeyHandle,
        wrapping: Option<KeyHandle>,
        blob_type: u32,
        flags: u32,
        buffer_len: usize,
    ) -> CspResult<Vec<u8>> {
        let object = self.key(key)?;
        if flags & CRYPT_SSL2_FALLBACK != 0 && object.alg != AlgId::SSL2_MASTER {
            return Err(CspError::BadKey("SSL2 fallback needs an SSL2 master key"));
        }
        let wrapping = wrapping.and_then(|w| self.keys.get(w).ok());

        match BlobType::from_u32(blob_type & 0xff)? {
            BlobType::Simple => {
                let wrapping = wrapping
                    .filter(|w| is_rsa(w.alg))
                    .ok_or(CspError::BadPublicKey)?;
                if !matches!(object.alg.class(), ALG_CLASS_DATA_ENCRYPT | ALG_CLASS_MSG_ENCRYPT) {
                    return Err(CspError::BadKey("only session keys export as SIMPLEBLOB"));
                }
                ensure_capacity(buffer_len, BlobHeader::SIZE + 4 + wrapping.block_len)?;

                let block = Zeroizing::new(padding::pad(
                    object.key_bytes(),
                    wrapping.block_len,
                    flags & CRYPT_SSL2_FALLBACK != 0,
                    |buf| self.engine.gen_random(buf),
                )?);
                let encrypted = self.engine.rsa_block(
                    &wrapping.context,
                    &block,
                    Direction::Encrypt,
                    RsaExponent::Public,
                )?;
                Ok(encode_simple_blob(object.alg, wrapping.alg, &encrypted))
            }
            BlobType::PublicKey => {
                if wrapping.is_some() || !is_rsa(object.alg) {
                    return Err(CspError::BadKey("not an exportable public key"));
                }
                ensure_capacity(buffer_len, BlobHeader::SIZE + RSA_HEADER_LEN + object.key_len)?;
                let public = self.engine.export_public_key(&object.context)?;
                Ok(encode_public_blob(object.alg, &public))
            }
            BlobType::PrivateKey => {
                if !is_rsa(object.alg) {
                    return Err(CspError::BadKey("not an RSA key pair"));
                }
                ensure_capacity(buffer_len, BlobHeader::SIZE + private_body_len(object.key_len))?;
                let private = self.engine.export_private_key(&object.context)?;
                Ok(encode_private_blob(object.alg, &private))
            }
            BlobType::PlainText => {
                if !matches!(
                    object.alg.key_class(),
                    Some(KeyClass::Block | KeyClass::Stream | KeyClass::SecureChannel)
                ) {
                    return Err(CspError::BadKey("only symmetric keys export in plaintext"));
                }
                ensure_capacity(buffer_len, BlobHeader::SIZE + 4 + object.key_len)?;
                Ok(encode_plaintext_blob(object.alg, object.key_bytes()))
            }
        }
    }

    pub(super) fn import_blob(
        &mut self,
        prov: ContainerHandle,
        data: &[u8],
        unwrapping: Option<KeyHandle>,
        flags: u32,
    ) -> CspResult<KeyHandle> {
        let (header, body) = BlobHeader::parse(data)?;
        let alg = header.alg;

        match BlobType::from_u32(u32::from(header.blob_type))? {
            BlobType::PrivateKey => {
                if !is_rsa(alg) {
                    return Err(CspError::BadAlgorithm(alg.0));
                }
                let private = decode_private_body(body)?;
                let handle = self.new_key(prov, alg, private.public.bit_len << 16)?;
                let handle = self.complete_key(handle, |engine, key| {
                    setup_key(engine, key)?;
                    engine.import_private_key(&mut key.context, &private)
                })?;

                #[cfg(feature = "tracing-log")]
                tracing::debug!("[csp] imported {}-bit private key", private.public.bit_len);

                Ok(handle)
            }
            BlobType::PublicKey => {
                let alg = if alg == AlgId::RSA_KEYX { AlgId::RSA_SIGN } else { alg };
                let public = decode_public_body(body)?;
                let handle = self.new_key(prov, alg, public.bit_len << 16)?;
                self.complete_key(handle, |engine, key| {
                    setup_key(engine, key)?;
                    engine.import_public_key(&mut key.context, &public)
                })
            }
            BlobType::Simple => {
                let unwrapping = unwrapping
                    .and_then(|k| self.keys.get(k).ok())
                    .filter(|k| k.alg == AlgId::RSA_KEYX)
                    .ok_or(CspError::BadPublicKey)?;
                let (_, encrypted) = decode_simple_body(body)?;
                let encrypted = encrypted
                    .get(..unwrapping.block_len)
                    .ok_or(CspError::BadData("simple blob shorter than the modulus"))?;
                let block = Zeroizing::new(self.engine.rsa_block(
                    &unwrapping.context,
                    encrypted,
                    Direction::Decrypt,
                    RsaExponent::Private,
                )?);
                let material = Zeroizing::new(padding::unpad(&block, MAX_KEY_SIZE)?);
                self.import_session_key(prov, alg, &material, flags)
            }
            BlobType::PlainText => {
                let material = decode_plaintext_body(body)?;
                if material.len() > MAX_KEY_SIZE {
                    return Err(CspError::BadData("plaintext key too long"));
                }
                self.import_session_key(prov, alg, material, flags)
            }
        }
    }

    /// Create a session key of `alg` holding `material` as its key bytes.
    fn import_session_key(
        &mut self,
        prov: ContainerHandle,
        alg: AlgId,
        material: &[u8],
        flags: u32,
    ) -> CspResult<KeyHandle> {
        let key_flags = ((material.len() as u32) << 19) | (flags & 0xffff);
        let handle = self.new_key(prov, alg, key_flags)?;
        self.complete_key(handle, |engine, key| {
            key.set_key_bytes(material);
            setup_key(engine, key)
        })
    }
}

