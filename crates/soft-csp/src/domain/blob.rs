//! # Key Blob Wire Format
//!
//! ```text
//! header      := type:u8 version:u8 reserved:u16 algId:u32
//! SIMPLEBLOB  := header encAlgId:u32 rsaEncrypted[modulusBytes]
//! PUBLICKEY   := header "RSA1":u32 bitLen:u32 pubExp:u32 modulus[n]
//! PRIVATEKEY  := header "RSA2":u32 bitLen:u32 pubExp:u32
//!                modulus[n] p[n/2] q[n/2] dp[n/2] dq[n/2] qInv[n/2] d[n]
//! PLAINTEXT   := header keyLen:u32 key[keyLen]
//! ```
//!
//! All integers are little-endian; big numbers are stored little-endian and
//! zero-padded to their field width.

use crate::domain::algorithms::AlgId;
use crate::domain::errors::{CspError, CspResult};

pub const CUR_BLOB_VERSION: u8 = 2;
pub const RSA1_MAGIC: u32 = 0x3141_5352;
pub const RSA2_MAGIC: u32 = 0x3241_5352;

/// Blob type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobType {
    Simple,
    PublicKey,
    PrivateKey,
    PlainText,
}

impl BlobType {
    pub const SIMPLEBLOB: u32 = 0x1;
    pub const PUBLICKEYBLOB: u32 = 0x6;
    pub const PRIVATEKEYBLOB: u32 = 0x7;
    pub const PLAINTEXTKEYBLOB: u32 = 0x8;

    pub fn from_u32(value: u32) -> CspResult<BlobType> {
        match value {
            Self::SIMPLEBLOB => Ok(BlobType::Simple),
            Self::PUBLICKEYBLOB => Ok(BlobType::PublicKey),
            Self::PRIVATEKEYBLOB => Ok(BlobType::PrivateKey),
            Self::PLAINTEXTKEYBLOB => Ok(BlobType::PlainText),
            other => Err(CspError::BadType(other)),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            BlobType::Simple => Self::SIMPLEBLOB,
            BlobType::PublicKey => Self::PUBLICKEYBLOB,
            BlobType::PrivateKey => Self::PRIVATEKEYBLOB,
            BlobType::PlainText => Self::PLAINTEXTKEYBLOB,
        }
    }
}

/// Fixed blob header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobHeader {
    pub blob_type: u8,
    pub version: u8,
    pub reserved: u16,
    pub alg: AlgId,
}

impl BlobHeader {
    pub const SIZE: usize = 8;

    pub fn new(blob_type: BlobType, alg: AlgId) -> Self {
        Self {
            blob_type: blob_type.as_u32() as u8,
            version: CUR_BLOB_VERSION,
            reserved: 0,
            alg,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.blob_type);
        out.push(self.version);
        out.extend_from_slice(&self.reserved.to_le_bytes());
        out.extend_from_slice(&self.alg.0.to_le_bytes());
    }

    /// Parse and validate the header, returning it with the body.
    pub fn parse(data: &[u8]) -> CspResult<(BlobHeader, &[u8])> {
        if data.len() < Self::SIZE {
            return Err(CspError::BadData("blob shorter than its header"));
        }
        let header = BlobHeader {
            blob_type: data[0],
            version: data[1],
            reserved: u16::from_le_bytes([data[2], data[3]]),
            alg: AlgId(read_u32(data, 4)),
        };
        if header.version != CUR_BLOB_VERSION || header.reserved != 0 {
            return Err(CspError::BadData("unsupported blob version"));
        }
        Ok((header, &data[Self::SIZE..]))
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(word)
}

/// Little-endian `value` zero-extended (or truncated) to `width`.
fn put_field(out: &mut Vec<u8>, value: &[u8], width: usize) {
    let start = out.len();
    out.extend_from_slice(&value[..value.len().min(width)]);
    out.resize(start + width, 0);
}

// =============================================================================
// RSA MATERIAL
// =============================================================================

/// RSA public key in blob order (little-endian modulus).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicParts {
    pub bit_len: u32,
    pub exponent: u32,
    pub modulus: Vec<u8>,
}

impl RsaPublicParts {
    pub fn key_len(&self) -> usize {
        (self.bit_len as usize) / 8
    }
}

/// RSA private key in blob order; every field little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPrivateParts {
    pub public: RsaPublicParts,
    pub prime1: Vec<u8>,
    pub prime2: Vec<u8>,
    pub exponent1: Vec<u8>,
    pub exponent2: Vec<u8>,
    pub coefficient: Vec<u8>,
    pub private_exponent: Vec<u8>,
}

const RSA_PUBKEY_SIZE: usize = 12;

/// Body length of a private-key blob for a `key_len`-byte modulus.
pub fn private_body_len(key_len: usize) -> usize {
    RSA_PUBKEY_SIZE + 2 * key_len + 5 * ((key_len + 1) / 2)
}

fn write_rsa_header(out: &mut Vec<u8>, magic: u32, public: &RsaPublicParts) {
    out.extend_from_slice(&magic.to_le_bytes());
    out.extend_from_slice(&public.bit_len.to_le_bytes());
    out.extend_from_slice(&public.exponent.to_le_bytes());
}

fn read_rsa_header(body: &[u8], magic: u32) -> CspResult<(u32, u32)> {
    if body.len() < RSA_PUBKEY_SIZE || read_u32(body, 0) != magic {
        return Err(CspError::BadData("bad RSA key header"));
    }
    Ok((read_u32(body, 4), read_u32(body, 8)))
}

pub fn encode_public_blob(alg: AlgId, public: &RsaPublicParts) -> Vec<u8> {
    let key_len = public.key_len();
    let mut out = Vec::with_capacity(BlobHeader::SIZE + RSA_PUBKEY_SIZE + key_len);
    BlobHeader::new(BlobType::PublicKey, alg).write(&mut out);
    write_rsa_header(&mut out, RSA1_MAGIC, public);
    put_field(&mut out, &public.modulus, key_len);
    out
}

pub fn decode_public_body(body: &[u8]) -> CspResult<RsaPublicParts> {
    let (bit_len, exponent) = read_rsa_header(body, RSA1_MAGIC)?;
    let key_len = (bit_len as usize) / 8;
    let modulus = body
        .get(RSA_PUBKEY_SIZE..RSA_PUBKEY_SIZE + key_len)
        .ok_or(CspError::BadData("public key blob truncated"))?;
    Ok(RsaPublicParts {
        bit_len,
        exponent,
        modulus: modulus.to_vec(),
    })
}

pub fn encode_private_blob(alg: AlgId, private: &RsaPrivateParts) -> Vec<u8> {
    let key_len = private.public.key_len();
    let half = (key_len + 1) / 2;
    let mut out = Vec::with_capacity(BlobHeader::SIZE + private_body_len(key_len));
    BlobHeader::new(BlobType::PrivateKey, alg).write(&mut out);
    write_rsa_header(&mut out, RSA2_MAGIC, &private.public);
    put_field(&mut out, &private.public.modulus, key_len);
    put_field(&mut out, &private.prime1, half);
    put_field(&mut out, &private.prime2, half);
    put_field(&mut out, &private.exponent1, half);
    put_field(&mut out, &private.exponent2, half);
    put_field(&mut out, &private.coefficient, half);
    put_field(&mut out, &private.private_exponent, key_len);
    out
}

pub fn decode_private_body(body: &[u8]) -> CspResult<RsaPrivateParts> {
    let (bit_len, exponent) = read_rsa_header(body, RSA2_MAGIC)?;
    let key_len = (bit_len as usize) / 8;
    let half = (key_len + 1) / 2;
    if body.len() < private_body_len(key_len) {
        return Err(CspError::BadData("private key blob truncated"));
    }
    let mut offset = RSA_PUBKEY_SIZE;
    let mut take = |len: usize| {
        let field = body[offset..offset + len].to_vec();
        offset += len;
        field
    };
    let modulus = take(key_len);
    Ok(RsaPrivateParts {
        public: RsaPublicParts {
            bit_len,
            exponent,
            modulus,
        },
        prime1: take(half),
        prime2: take(half),
        exponent1: take(half),
        exponent2: take(half),
        coefficient: take(half),
        private_exponent: take(key_len),
    })
}

// =============================================================================
// SYMMETRIC BLOBS
// =============================================================================

pub fn encode_simple_blob(alg: AlgId, wrapping_alg: AlgId, encrypted: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(BlobHeader::SIZE + 4 + encrypted.len());
    BlobHeader::new(BlobType::Simple, alg).write(&mut out);
    out.extend_from_slice(&wrapping_alg.0.to_le_bytes());
    out.extend_from_slice(encrypted);
    out
}

/// Wrapping algorithm and the encrypted block.
pub fn decode_simple_body(body: &[u8]) -> CspResult<(AlgId, &[u8])> {
    if body.len() < 4 {
        return Err(CspError::BadData("simple blob truncated"));
    }
    Ok((AlgId(read_u32(body, 0)), &body[4..]))
}

pub fn encode_plaintext_blob(alg: AlgId, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(BlobHeader::SIZE + 4 + key.len());
    BlobHeader::new(BlobType::PlainText, alg).write(&mut out);
    out.extend_from_slice(&(key.len() as u32).to_le_bytes());
    out.extend_from_slice(key);
    out
}

pub fn decode_plaintext_body(body: &[u8]) -> CspResult<&[u8]> {
    if body.len() < 4 {
        return Err(CspError::BadData("plaintext blob truncated"));
    }
    let len = read_u32(body, 0) as usize;
    body.get(4..4 + len)
        .ok_or(CspError::BadData("plaintext blob truncated"))
}
