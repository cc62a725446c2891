//! # TLS1 Key Derivation
//!
//! RFC 2246 section 5 `P_hash` and the dual MD5/SHA-1 PRF, plus the slicing
//! of the SChannel key-expansion block (RFC 2246 section 6.3).
//!
//! The MAC itself is abstracted behind [`PrfMac`] so the provider can drive
//! it through its own HMAC hash objects.

use crate::domain::algorithms::AlgId;
use crate::domain::errors::{CspError, CspResult};
use crate::domain::entities::MAX_HASH_SIZE;

pub const MASTER_SECRET_LABEL: &[u8] = b"master secret";
pub const KEY_EXPANSION_LABEL: &[u8] = b"key expansion";
pub const MASTER_SECRET_LEN: usize = 48;
pub const KEY_EXPANSION_LEN: usize = MAX_HASH_SIZE;

/// A keyed MAC. Each call authenticates one message given as parts.
pub trait PrfMac {
    fn mac(&mut self, parts: &[&[u8]]) -> CspResult<Vec<u8>>;
}

/// XOR `P_hash(secret, seed)` into `out`.
///
/// `out` is not cleared first, so two streams can be combined in place.
pub fn p_hash<M: PrfMac + ?Sized>(mac: &mut M, seed: &[u8], out: &mut [u8]) -> CspResult<()> {
    let mut a = mac.mac(&[seed])?;
    let mut written = 0;
    while written < out.len() {
        let block = mac.mac(&[&a, seed])?;
        if block.is_empty() {
            return Err(CspError::Failure("empty MAC output".to_string()));
        }
        for (dst, src) in out[written..].iter_mut().zip(&block) {
            *dst ^= src;
        }
        written += block.len();
        a = mac.mac(&[&a])?;
    }
    Ok(())
}

/// TLS1 PRF: `P_MD5(S1, label ‖ seed) XOR P_SHA1(S2, label ‖ seed)`.
///
/// The halves are `ceil(len/2)` bytes; for odd lengths they share the middle
/// byte. `keyed` builds an HMAC of the given hash algorithm over a secret.
pub fn prf<M, F>(secret: &[u8], label: &[u8], seed: &[u8], out_len: usize, mut keyed: F) -> CspResult<Vec<u8>>
where
    M: PrfMac,
    F: FnMut(AlgId, &[u8]) -> CspResult<M>,
{
    let half = (secret.len() + 1) / 2;
    let first = &secret[..half];
    let second = &secret[secret.len() / 2..];

    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label);
    label_seed.extend_from_slice(seed);

    let mut out = vec![0u8; out_len];
    p_hash(&mut keyed(AlgId::MD5, first)?, &label_seed, &mut out)?;
    p_hash(&mut keyed(AlgId::SHA, second)?, &label_seed, &mut out)?;
    Ok(out)
}

/// `client_random ‖ server_random`, the master-secret seed.
pub fn master_secret_seed(client_random: &[u8], server_random: &[u8]) -> Vec<u8> {
    [client_random, server_random].concat()
}

/// `server_random ‖ client_random`, the key-expansion seed.
pub fn key_expansion_seed(client_random: &[u8], server_random: &[u8]) -> Vec<u8> {
    [server_random, client_random].concat()
}

/// Offsets of the per-direction secrets inside the key expansion.
///
/// Order: client MAC, server MAC, client key, server key, client IV,
/// server IV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyExpansionLayout {
    pub mac_len: usize,
    pub enc_len: usize,
    pub block_len: usize,
}

impl KeyExpansionLayout {
    fn slice(offset: usize, len: usize) -> CspResult<std::ops::Range<usize>> {
        let end = offset + len;
        if end > KEY_EXPANSION_LEN {
            return Err(CspError::BadData("key expansion too short"));
        }
        Ok(offset..end)
    }

    pub fn mac_key(&self, server: bool) -> CspResult<std::ops::Range<usize>> {
        let offset = if server { self.mac_len } else { 0 };
        Self::slice(offset, self.mac_len)
    }

    pub fn enc_key(&self, server: bool) -> CspResult<std::ops::Range<usize>> {
        let offset = 2 * self.mac_len + if server { self.enc_len } else { 0 };
        Self::slice(offset, self.enc_len)
    }

    pub fn iv(&self, server: bool) -> CspResult<std::ops::Range<usize>> {
        let offset =
            2 * self.mac_len + 2 * self.enc_len + if server { self.block_len } else { 0 };
        Self::slice(offset, self.block_len)
    }
}
