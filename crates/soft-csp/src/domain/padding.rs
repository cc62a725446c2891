//! # PKCS#1 Padding & Signature Blocks
//!
//! - block type 2 encryption padding (`00 02 <non-zero random> 00 <data>`)
//! - block type 1 signature blocks with a DigestInfo prefix
//! - the X9.31 signature layout
//!
//! Randomness is supplied by the caller so the codec stays engine-agnostic.

use crate::domain::algorithms::AlgId;
use crate::domain::errors::{CspError, CspResult};
use crate::domain::flags::{CRYPT_NOHASHOID, CRYPT_X931_FORMAT};

const BLOCK_TYPE_ENCRYPT: u8 = 0x02;
const BLOCK_TYPE_SIGN: u8 = 0x01;
/// Header, terminator and the minimum eight filler bytes.
pub const PKCS1_OVERHEAD: usize = 11;
const SSL2_FALLBACK_FILL: u8 = 0x03;
const SSL2_FALLBACK_LEN: usize = 8;

const MD2_PREFIX: [u8; 18] = [
    0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x02, 0x05, 0x00,
    0x04, 0x10,
];
const MD4_PREFIX: [u8; 18] = [
    0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x04, 0x05, 0x00,
    0x04, 0x10,
];
const MD5_PREFIX: [u8; 18] = [
    0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x05, 0x05, 0x00,
    0x04, 0x10,
];
const SHA1_PREFIX: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];

/// DigestInfo prefix for a hash algorithm.
pub fn digest_info_prefix(alg: AlgId) -> Option<&'static [u8]> {
    match alg {
        AlgId::MD2 => Some(&MD2_PREFIX),
        AlgId::MD4 => Some(&MD4_PREFIX),
        AlgId::MD5 => Some(&MD5_PREFIX),
        AlgId::SHA => Some(&SHA1_PREFIX),
        _ => None,
    }
}

/// Build a `buffer_len`-byte encryption block around `data`.
///
/// With `ssl2_fallback` the last eight filler bytes are `0x03`, marking a
/// client that could have negotiated SSL3.
pub fn pad<F>(data: &[u8], buffer_len: usize, ssl2_fallback: bool, mut fill_random: F) -> CspResult<Vec<u8>>
where
    F: FnMut(&mut [u8]) -> CspResult<()>,
{
    if buffer_len < PKCS1_OVERHEAD || data.len() > buffer_len - PKCS1_OVERHEAD {
        return Err(CspError::BadLength);
    }
    let filler_end = buffer_len - data.len() - 1;
    let mut block = vec![0u8; buffer_len];
    block[1] = BLOCK_TYPE_ENCRYPT;

    for byte in &mut block[2..filler_end] {
        while *byte == 0 {
            fill_random(std::slice::from_mut(byte))?;
        }
    }
    if ssl2_fallback {
        block[filler_end - SSL2_FALLBACK_LEN..filler_end].fill(SSL2_FALLBACK_FILL);
    }
    block[filler_end] = 0x00;
    block[filler_end + 1..].copy_from_slice(data);
    Ok(block)
}

/// Strip block type 2 padding. `capacity` is the caller's output room.
pub fn unpad(block: &[u8], capacity: usize) -> CspResult<Vec<u8>> {
    let separator = block
        .iter()
        .skip(2)
        .position(|&b| b == 0)
        .map(|pos| pos + 2)
        .ok_or(CspError::BadData("missing padding terminator"))?;
    let payload = &block[separator + 1..];
    if block.len() < 2 || block[0] != 0x00 || block[1] != BLOCK_TYPE_ENCRYPT {
        return Err(CspError::BadData("wrong padding block type"));
    }
    if capacity < payload.len() {
        return Err(CspError::BadData("output buffer too small for payload"));
    }
    Ok(payload.to_vec())
}

/// Build the `len`-byte block that gets signed.
///
/// `flags` may carry `CRYPT_NOHASHOID` (omit the DigestInfo prefix) and
/// `CRYPT_X931_FORMAT`. The algorithm must be one of the four digests with a
/// known prefix even when the prefix is omitted.
pub fn build_signature_block(len: usize, alg: AlgId, digest: &[u8], flags: u32) -> CspResult<Vec<u8>> {
    let prefix = digest_info_prefix(alg).ok_or(CspError::BadAlgorithm(alg.0))?;
    let mut block = Vec::with_capacity(len);

    if flags & CRYPT_X931_FORMAT != 0 {
        // 6b bb..bb ba <digest> 33 cc
        let fill = len
            .checked_sub(digest.len() + 4)
            .ok_or(CspError::BadLength)?;
        block.push(0x6b);
        block.resize(1 + fill, 0xbb);
        block.push(0xba);
        block.extend_from_slice(digest);
        block.extend_from_slice(&[0x33, 0xcc]);
        return Ok(block);
    }

    let prefix: &[u8] = if flags & CRYPT_NOHASHOID != 0 { &[] } else { prefix };
    let fill = len
        .checked_sub(3 + prefix.len() + digest.len())
        .ok_or(CspError::BadLength)?;
    block.extend_from_slice(&[0x00, BLOCK_TYPE_SIGN]);
    block.resize(2 + fill, 0xff);
    block.push(0x00);
    block.extend_from_slice(prefix);
    block.extend_from_slice(digest);
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_rng() -> impl FnMut(&mut [u8]) -> CspResult<()> {
        // yields 0 every third draw to exercise the redraw loop
        let mut n: u8 = 0;
        move |buf: &mut [u8]| {
            for b in buf.iter_mut() {
                n = n.wrapping_add(1);
                *b = if n % 3 == 0 { 0 } else { n };
            }
            Ok(())
        }
    }

    #[test]
    fn test_pad_layout() {
        let block = pad(b"secret", 32, false, counting_rng()).unwrap();
        assert_eq!(block.len(), 32);
        assert_eq!(&block[..2], &[0x00, 0x02]);
        assert!(block[2..25].iter().all(|&b| b != 0));
        assert_eq!(block[25], 0x00);
        assert_eq!(&block[26..], b"secret");
    }

    #[test]
    fn test_pad_rejects_oversized_data() {
        assert!(matches!(pad(&[1; 22], 32, false, counting_rng()), Err(CspError::BadLength)));
        assert!(pad(&[1; 21], 32, false, counting_rng()).is_ok());
        assert!(matches!(pad(&[], 8, false, counting_rng()), Err(CspError::BadLength)));
    }

    #[test]
    fn test_ssl2_fallback_marker() {
        let block = pad(&[0xaa; 4], 24, true, counting_rng()).unwrap();
        assert_eq!(&block[11..19], &[0x03; 8]);
        assert_eq!(block[19], 0x00);
        assert_eq!(&block[20..], &[0xaa; 4]);
    }

    #[test]
    fn test_pad_unpad_round_trip() {
        for len in 0..=53 {
            let data: Vec<u8> = (0..len as u8).collect();
            let block = pad(&data, 64, false, counting_rng()).unwrap();
            assert_eq!(unpad(&block, 64).unwrap(), data);
        }
    }

    #[test]
    fn test_unpad_failures() {
        let mut block = pad(b"abc", 16, false, counting_rng()).unwrap();
        assert!(matches!(unpad(&block, 2), Err(CspError::BadData(_))));

        block[1] = 0x01;
        assert!(matches!(unpad(&block, 16), Err(CspError::BadData(_))));

        let no_terminator = [0x00, 0x02, 1, 2, 3, 4];
        assert!(matches!(unpad(&no_terminator, 16), Err(CspError::BadData(_))));
    }

    #[test]
    fn test_signature_block_with_oid() {
        let digest = [0xab; 16];
        let block = build_signature_block(64, AlgId::MD5, &digest, 0).unwrap();
        assert_eq!(block.len(), 64);
        assert_eq!(&block[..2], &[0x00, 0x01]);
        let fill_end = 64 - 16 - 18 - 1;
        assert!(block[2..fill_end].iter().all(|&b| b == 0xff));
        assert_eq!(block[fill_end], 0x00);
        assert_eq!(&block[fill_end + 1..fill_end + 19], &MD5_PREFIX);
        assert_eq!(&block[48..], &digest);
    }

    #[test]
    fn test_signature_block_sha1_without_oid() {
        let digest = [0x11; 20];
        let block = build_signature_block(64, AlgId::SHA, &digest, CRYPT_NOHASHOID).unwrap();
        assert_eq!(block.len(), 64);
        assert_eq!(block[43], 0x00);
        assert_eq!(block[42], 0xff);
        assert_eq!(&block[44..], &digest);
    }

    #[test]
    fn test_signature_block_x931() {
        let digest = [0x5a; 20];
        let block = build_signature_block(64, AlgId::SHA, &digest, CRYPT_X931_FORMAT).unwrap();
        assert_eq!(block.len(), 64);
        assert_eq!(block[0], 0x6b);
        assert!(block[1..41].iter().all(|&b| b == 0xbb));
        assert_eq!(block[41], 0xba);
        assert_eq!(&block[42..62], &digest);
        assert_eq!(&block[62..], &[0x33, 0xcc]);
    }

    #[test]
    fn test_unknown_hash_rejected_even_without_oid() {
        assert!(matches!(
            build_signature_block(64, AlgId::HMAC, &[0; 16], CRYPT_NOHASHOID),
            Err(CspError::BadAlgorithm(0x8009))
        ));
    }
}
