//! # Data Transforms
//!
//! Encryption and decryption through a key object.
//!
//! Block ciphers chain per the key's mode (ECB, CBC or 8-bit CFB) and pad
//! the final block with the pad length repeated. Stream ciphers transform
//! in place. RSA keys encrypt a single PKCS#1 block per call.

use super::keys::setup_key;
use super::*;
use crate::domain::algorithms::{AlgId, KeyClass};
use crate::domain::entities::{CipherMode, KeyState, MAX_BLOCK_SIZE};
use crate::domain::flags::*;
use crate::domain::padding;
use crate::ports::outbound::{Direction, RsaExponent};

impl<E, S> CryptoProvider<E, S>
where
    E: PrimitiveEngine,
    S: KeysetStore,
{
    /// Encrypt `data`, feeding the plaintext to `hash` first when it names a
    /// live hash object.
    pub(super) fn encrypt_data(
        &mut self,
        key: KeyHandle,
        hash: Option<HashHandle>,
        is_final: bool,
        flags: u32,
        data: &[u8],
        buffer_len: usize,
    ) -> CspResult<Vec<u8>> {
        if flags & !CRYPT_SSL2_FALLBACK != 0 {
            return Err(CspError::BadFlags(flags));
        }
        enter_state(self.key_mut(key)?, KeyState::Encrypting)?;

        if let Some(hash) = hash.filter(|h| self.hashes.is_valid(*h)) {
            self.feed_hash(hash, data, 0)?;
        }

        let engine = &self.engine;
        let object = self.keys.get_mut(key)?;
        let (output, is_final) = match object.alg.key_class() {
            Some(KeyClass::Block) => {
                let output = encrypt_blocks(engine, object, data, is_final, buffer_len)?;
                (output, is_final)
            }
            Some(KeyClass::Stream) => {
                ensure_capacity(buffer_len, data.len())?;
                let mut output = data.to_vec();
                engine.encrypt_stream(&mut object.context, &mut output)?;
                (output, is_final)
            }
            Some(KeyClass::Rsa) => {
                if object.alg == AlgId::RSA_SIGN {
                    return Err(CspError::BadKey("signature keys cannot encrypt"));
                }
                ensure_capacity(buffer_len, object.block_len)?;
                let block = padding::pad(
                    data,
                    object.block_len,
                    flags & CRYPT_SSL2_FALLBACK != 0,
                    |buf| engine.gen_random(buf),
                )?;
                let output =
                    engine.rsa_block(&object.context, &block, Direction::Encrypt, RsaExponent::Public)?;
                (output, true)
            }
            _ => return Err(CspError::BadType(object.alg.0)),
        };

        if is_final {
            setup_key(engine, object)?;
        }
        Ok(output)
    }

    /// Decrypt `data`; the recovered plaintext is fed to `hash` afterwards.
    pub(super) fn decrypt_data(
        &mut self,
        key: KeyHandle,
        hash: Option<HashHandle>,
        is_final: bool,
        flags: u32,
        data: &[u8],
    ) -> CspResult<Vec<u8>> {
        if flags & !CRYPT_SSL2_FALLBACK != 0 {
            return Err(CspError::BadFlags(flags));
        }
        let engine = &self.engine;
        let object = self.keys.get_mut(key)?;
        enter_state(object, KeyState::Decrypting)?;

        let class = object.alg.key_class();
        let result = match class {
            Some(KeyClass::Block) => decrypt_blocks(engine, object, data, is_final),
            Some(KeyClass::Stream) => {
                let mut output = data.to_vec();
                engine.encrypt_stream(&mut object.context, &mut output)?;
                Ok(output)
            }
            Some(KeyClass::Rsa) => rsa_decrypt(engine, object, data),
            _ => return Err(CspError::BadType(object.alg.0)),
        };

        // a final call re-arms the key even when the padding check failed
        if is_final || class == Some(KeyClass::Rsa) {
            setup_key(engine, object)?;
        }
        let output = result?;

        if let Some(hash) = hash.filter(|h| self.hashes.is_valid(*h)) {
            self.feed_hash(hash, &output, 0)?;
        }
        Ok(output)
    }
}

fn rsa_decrypt<E: PrimitiveEngine>(
    engine: &E,
    key: &Key<E>,
    data: &[u8],
) -> CspResult<Vec<u8>> {
    if key.alg == AlgId::RSA_SIGN {
        return Err(CspError::BadKey("signature keys cannot decrypt"));
    }
    if data.len() != key.block_len {
        return Err(CspError::BadData("ciphertext is not one modulus block"));
    }
    let block = engine.rsa_block(&key.context, data, Direction::Decrypt, RsaExponent::Private)?;
    padding::unpad(&block, key.block_len)
}

/// Idle keys enter `target`; a key busy in the other direction is refused.
fn enter_state<K>(key: &mut KeyObject<K>, target: KeyState) -> CspResult<()> {
    if key.state == KeyState::Idle {
        key.state = target;
    }
    if key.state != target {
        return Err(CspError::BadKeyState);
    }
    Ok(())
}

fn block_len<K>(key: &KeyObject<K>) -> CspResult<usize> {
    match key.block_len {
        0 => Err(CspError::BadKey("key has no block length")),
        len if len > MAX_BLOCK_SIZE => Err(CspError::BadKey("block length too large")),
        len => Ok(len),
    }
}

fn encrypt_blocks<E: PrimitiveEngine>(
    engine: &E,
    key: &mut Key<E>,
    data: &[u8],
    is_final: bool,
    buffer_len: usize,
) -> CspResult<Vec<u8>> {
    let bl = block_len(key)?;
    if !is_final && data.len() % bl != 0 {
        return Err(CspError::BadData("input is not a whole number of blocks"));
    }
    let encrypted_len = (data.len() / bl + usize::from(is_final)) * bl;
    ensure_capacity(buffer_len, encrypted_len)?;

    let mut buf = data.to_vec();
    buf.resize(encrypted_len, (encrypted_len - data.len()) as u8);

    for block in buf.chunks_mut(bl) {
        match CipherMode::from_u32(key.mode) {
            Some(CipherMode::Ecb) => {
                let out = engine.encrypt_block(&key.context, block, Direction::Encrypt)?;
                block.copy_from_slice(&out[..bl]);
            }
            Some(CipherMode::Cbc) => {
                for (byte, chain) in block.iter_mut().zip(&key.chain_vector) {
                    *byte ^= chain;
                }
                let out = engine.encrypt_block(&key.context, block, Direction::Encrypt)?;
                block.copy_from_slice(&out[..bl]);
                key.chain_vector[..bl].copy_from_slice(block);
            }
            Some(CipherMode::Cfb) => cfb_block(engine, key, block, Direction::Encrypt)?,
            _ => return Err(CspError::BadAlgorithm(key.alg.0)),
        }
    }
    Ok(buf)
}

fn decrypt_blocks<E: PrimitiveEngine>(
    engine: &E,
    key: &mut Key<E>,
    data: &[u8],
    is_final: bool,
) -> CspResult<Vec<u8>> {
    let bl = block_len(key)?;
    if data.len() % bl != 0 {
        return Err(CspError::BadData("input is not a whole number of blocks"));
    }

    let mut buf = data.to_vec();
    for block in buf.chunks_mut(bl) {
        match CipherMode::from_u32(key.mode) {
            Some(CipherMode::Ecb) => {
                let out = engine.encrypt_block(&key.context, block, Direction::Decrypt)?;
                block.copy_from_slice(&out[..bl]);
            }
            Some(CipherMode::Cbc) => {
                let mut out = engine.encrypt_block(&key.context, block, Direction::Decrypt)?;
                for (byte, chain) in out.iter_mut().zip(&key.chain_vector[..bl]) {
                    *byte ^= chain;
                }
                key.chain_vector[..bl].copy_from_slice(block);
                block.copy_from_slice(&out[..bl]);
            }
            Some(CipherMode::Cfb) => cfb_block(engine, key, block, Direction::Decrypt)?,
            _ => return Err(CspError::BadAlgorithm(key.alg.0)),
        }
    }

    if is_final {
        let pad = usize::from(*buf.last().ok_or(CspError::BadData("no final block"))?);
        if pad == 0 || pad > bl || pad > buf.len() {
            return Err(CspError::BadData("bad final block padding"));
        }
        buf.truncate(buf.len() - pad);
    }
    Ok(buf)
}

/// 8-bit CFB over one block, in place.
///
/// The register always shifts in the ciphertext byte: the output when
/// encrypting, the input when decrypting.
fn cfb_block<E: PrimitiveEngine>(
    engine: &E,
    key: &mut Key<E>,
    block: &mut [u8],
    direction: Direction,
) -> CspResult<()> {
    let bl = block.len();
    for byte in block.iter_mut() {
        let keystream = engine.encrypt_block(&key.context, &key.chain_vector[..bl], Direction::Encrypt)?;
        let input = *byte;
        *byte ^= keystream[0];
        let feedback = match direction {
            Direction::Encrypt => *byte,
            Direction::Decrypt => input,
        };
        key.chain_vector.copy_within(1..bl, 0);
        key.chain_vector[bl - 1] = feedback;
    }
    Ok(())
}
