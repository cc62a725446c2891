//! # Algorithm Identifiers & Capability Tables
//!
//! Algorithm ids use the classic `CALG_*` numbering: bits 13..15 carry the
//! class, bits 9..12 the type and the low bits the sub-id.
//!
//! Each [`Personality`] is a fixed whitelist of algorithms with key-size
//! bounds. The table a container uses is chosen when it is acquired and never
//! changes afterwards.

use crate::domain::errors::{CspError, CspResult};

// =============================================================================
// ALGORITHM IDS
// =============================================================================

/// Algorithm identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlgId(pub u32);

const CLASS_MASK: u32 = 7 << 13;
const TYPE_MASK: u32 = 15 << 9;

pub const ALG_CLASS_SIGNATURE: u32 = 1 << 13;
pub const ALG_CLASS_MSG_ENCRYPT: u32 = 2 << 13;
pub const ALG_CLASS_DATA_ENCRYPT: u32 = 3 << 13;
pub const ALG_CLASS_HASH: u32 = 4 << 13;
pub const ALG_CLASS_KEY_EXCHANGE: u32 = 5 << 13;

pub const ALG_TYPE_RSA: u32 = 2 << 9;
pub const ALG_TYPE_BLOCK: u32 = 3 << 9;
pub const ALG_TYPE_STREAM: u32 = 4 << 9;
pub const ALG_TYPE_SECURECHANNEL: u32 = 6 << 9;

impl AlgId {
    pub const MD2: AlgId = AlgId(0x8001);
    pub const MD4: AlgId = AlgId(0x8002);
    pub const MD5: AlgId = AlgId(0x8003);
    pub const SHA: AlgId = AlgId(0x8004);
    pub const MAC: AlgId = AlgId(0x8005);
    pub const SSL3_SHAMD5: AlgId = AlgId(0x8008);
    pub const HMAC: AlgId = AlgId(0x8009);
    pub const TLS1PRF: AlgId = AlgId(0x800a);
    pub const RSA_SIGN: AlgId = AlgId(0x2400);
    pub const RSA_KEYX: AlgId = AlgId(0xa400);
    pub const DES: AlgId = AlgId(0x6601);
    pub const RC2: AlgId = AlgId(0x6602);
    pub const DES3: AlgId = AlgId(0x6603);
    pub const DES3_112: AlgId = AlgId(0x6609);
    pub const RC4: AlgId = AlgId(0x6801);
    pub const SSL3_MASTER: AlgId = AlgId(0x4c01);
    pub const SCHANNEL_MASTER_HASH: AlgId = AlgId(0x4c02);
    pub const SCHANNEL_MAC_KEY: AlgId = AlgId(0x4c03);
    pub const PCT1_MASTER: AlgId = AlgId(0x4c04);
    pub const SSL2_MASTER: AlgId = AlgId(0x4c05);
    pub const TLS1_MASTER: AlgId = AlgId(0x4c06);
    pub const SCHANNEL_ENC_KEY: AlgId = AlgId(0x4c07);

    /// `ALG_CLASS_*` bits.
    pub fn class(self) -> u32 {
        self.0 & CLASS_MASK
    }

    /// `ALG_TYPE_*` bits.
    pub fn alg_type(self) -> u32 {
        self.0 & TYPE_MASK
    }

    /// Transform class of a key of this algorithm, if it is a key algorithm.
    pub fn key_class(self) -> Option<KeyClass> {
        match self {
            AlgId::DES | AlgId::DES3_112 | AlgId::DES3 | AlgId::RC2 => Some(KeyClass::Block),
            AlgId::RC4 => Some(KeyClass::Stream),
            AlgId::RSA_SIGN | AlgId::RSA_KEYX => Some(KeyClass::Rsa),
            AlgId::SSL3_MASTER
            | AlgId::PCT1_MASTER
            | AlgId::SSL2_MASTER
            | AlgId::TLS1_MASTER
            | AlgId::SCHANNEL_MAC_KEY
            | AlgId::SCHANNEL_ENC_KEY => Some(KeyClass::SecureChannel),
            _ => None,
        }
    }

    /// Behaviour class of a hash object of this algorithm.
    pub fn hash_class(self) -> Option<HashClass> {
        match self {
            AlgId::MD2 | AlgId::MD4 | AlgId::MD5 | AlgId::SHA => Some(HashClass::Plain),
            AlgId::MAC => Some(HashClass::Mac),
            AlgId::HMAC => Some(HashClass::Hmac),
            AlgId::TLS1PRF => Some(HashClass::Tls1Prf),
            AlgId::SCHANNEL_MASTER_HASH => Some(HashClass::SchannelMaster),
            AlgId::SSL3_SHAMD5 => Some(HashClass::Composite),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// How a key transforms data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// 8-byte block ciphers with ECB/CBC/CFB chaining.
    Block,
    /// Whole-buffer stream cipher.
    Stream,
    /// Single-block RSA with PKCS#1 padding.
    Rsa,
    /// Protocol master secrets and SChannel sub-keys. Never transform data.
    SecureChannel,
}

/// How a hash object digests data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashClass {
    Plain,
    Mac,
    Hmac,
    Tls1Prf,
    SchannelMaster,
    /// Value supplied through the hash-value parameter only.
    Composite,
}

/// Long-term key slot in a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySpec {
    KeyExchange,
    Signature,
}

impl KeySpec {
    pub const AT_KEYEXCHANGE: u32 = 1;
    pub const AT_SIGNATURE: u32 = 2;

    pub fn from_u32(value: u32) -> Option<KeySpec> {
        match value {
            Self::AT_KEYEXCHANGE => Some(KeySpec::KeyExchange),
            Self::AT_SIGNATURE => Some(KeySpec::Signature),
            _ => None,
        }
    }

    /// RSA algorithm id backing this slot.
    pub fn alg_id(self) -> AlgId {
        match self {
            KeySpec::KeyExchange => AlgId::RSA_KEYX,
            KeySpec::Signature => AlgId::RSA_SIGN,
        }
    }
}

// =============================================================================
// CAPABILITY TABLES
// =============================================================================

pub const CRYPT_FLAG_PCT1: u32 = 0x0001;
pub const CRYPT_FLAG_SSL2: u32 = 0x0002;
pub const CRYPT_FLAG_SSL3: u32 = 0x0004;
pub const CRYPT_FLAG_TLS1: u32 = 0x0008;
pub const CRYPT_FLAG_IPSEC: u32 = 0x0010;
pub const CRYPT_FLAG_SIGNING: u32 = 0x0020;

const ALL_PROTOCOLS: u32 = CRYPT_FLAG_PCT1 | CRYPT_FLAG_SSL2 | CRYPT_FLAG_SSL3 | CRYPT_FLAG_TLS1;

/// One row of a personality table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmInfo {
    pub alg: AlgId,
    pub default_bits: u32,
    pub min_bits: u32,
    pub max_bits: u32,
    pub protocols: u32,
    pub name: &'static str,
    pub long_name: &'static str,
}

const fn row(
    alg: AlgId,
    default_bits: u32,
    min_bits: u32,
    max_bits: u32,
    protocols: u32,
    name: &'static str,
    long_name: &'static str,
) -> AlgorithmInfo {
    AlgorithmInfo {
        alg,
        default_bits,
        min_bits,
        max_bits,
        protocols,
        name,
        long_name,
    }
}

const RC2_NAME: &str = "RSA Data Security's RC2";
const RC4_NAME: &str = "RSA Data Security's RC4";
const DES_NAME: &str = "Data Encryption Standard (DES)";
const SHA_NAME: &str = "Secure Hash Algorithm (SHA-1)";
const HMAC_NAME: &str = "Hugo's MAC (HMAC)";
const SIGN_IPSEC: u32 = CRYPT_FLAG_SIGNING | CRYPT_FLAG_IPSEC;

static BASE_TABLE: [AlgorithmInfo; 12] = [
    row(AlgId::RC2, 40, 40, 56, 0, "RC2", RC2_NAME),
    row(AlgId::RC4, 40, 40, 56, 0, "RC4", RC4_NAME),
    row(AlgId::DES, 56, 56, 56, 0, "DES", DES_NAME),
    row(AlgId::SHA, 160, 160, 160, CRYPT_FLAG_SIGNING, "SHA-1", SHA_NAME),
    row(AlgId::MD2, 128, 128, 128, CRYPT_FLAG_SIGNING, "MD2", "Message Digest 2 (MD2)"),
    row(AlgId::MD4, 128, 128, 128, CRYPT_FLAG_SIGNING, "MD4", "Message Digest 4 (MD4)"),
    row(AlgId::MD5, 128, 128, 128, CRYPT_FLAG_SIGNING, "MD5", "Message Digest 5 (MD5)"),
    row(AlgId::SSL3_SHAMD5, 288, 288, 288, 0, "SSL3 SHAMD5", "SSL3 SHAMD5"),
    row(AlgId::MAC, 0, 0, 0, 0, "MAC", "Message Authentication Code"),
    row(AlgId::RSA_SIGN, 512, 384, 16384, SIGN_IPSEC, "RSA_SIGN", "RSA Signature"),
    row(AlgId::RSA_KEYX, 512, 384, 1024, SIGN_IPSEC, "RSA_KEYX", "RSA Key Exchange"),
    row(AlgId::HMAC, 0, 0, 0, 0, "HMAC", HMAC_NAME),
];

// Strong and Enhanced share one table.
static STRONG_TABLE: [AlgorithmInfo; 14] = [
    row(AlgId::RC2, 128, 40, 128, 0, "RC2", RC2_NAME),
    row(AlgId::RC4, 128, 40, 128, 0, "RC4", RC4_NAME),
    row(AlgId::DES, 56, 56, 56, 0, "DES", DES_NAME),
    row(AlgId::DES3_112, 112, 112, 112, 0, "3DES TWO KEY", "Two Key Triple DES"),
    row(AlgId::DES3, 168, 168, 168, 0, "3DES", "Three Key Triple DES"),
    row(AlgId::SHA, 160, 160, 160, CRYPT_FLAG_SIGNING, "SHA-1", SHA_NAME),
    row(AlgId::MD2, 128, 128, 128, CRYPT_FLAG_SIGNING, "MD2", "Message Digest 2 (MD2)"),
    row(AlgId::MD4, 128, 128, 128, CRYPT_FLAG_SIGNING, "MD4", "Message Digest 4 (MD4)"),
    row(AlgId::MD5, 128, 128, 128, CRYPT_FLAG_SIGNING, "MD5", "Message Digest 5 (MD5)"),
    row(AlgId::SSL3_SHAMD5, 288, 288, 288, 0, "SSL3 SHAMD5", "SSL3 SHAMD5"),
    row(AlgId::MAC, 0, 0, 0, 0, "MAC", "Message Authentication Code"),
    row(AlgId::RSA_SIGN, 1024, 384, 16384, SIGN_IPSEC, "RSA_SIGN", "RSA Signature"),
    row(AlgId::RSA_KEYX, 1024, 384, 16384, SIGN_IPSEC, "RSA_KEYX", "RSA Key Exchange"),
    row(AlgId::HMAC, 0, 0, 0, 0, "HMAC", HMAC_NAME),
];

const SIGN_ALL: u32 = CRYPT_FLAG_SIGNING | ALL_PROTOCOLS;
const UNBOUNDED: u32 = u32::MAX;

static SCHANNEL_TABLE: [AlgorithmInfo; 20] = [
    row(AlgId::RC2, 128, 40, 128, ALL_PROTOCOLS, "RC2", RC2_NAME),
    row(AlgId::RC4, 128, 40, 128, ALL_PROTOCOLS, "RC4", RC4_NAME),
    row(AlgId::DES, 56, 56, 56, ALL_PROTOCOLS, "DES", DES_NAME),
    row(AlgId::DES3_112, 112, 112, 112, ALL_PROTOCOLS, "3DES TWO KEY", "Two Key Triple DES"),
    row(AlgId::DES3, 168, 168, 168, ALL_PROTOCOLS, "3DES", "Three Key Triple DES"),
    row(AlgId::SHA, 160, 160, 160, SIGN_ALL, "SHA-1", SHA_NAME),
    row(AlgId::MD5, 128, 128, 128, SIGN_ALL, "MD5", "Message Digest 5 (MD5)"),
    row(AlgId::SSL3_SHAMD5, 288, 288, 288, 0, "SSL3 SHAMD5", "SSL3 SHAMD5"),
    row(AlgId::MAC, 0, 0, 0, 0, "MAC", "Message Authentication Code"),
    row(AlgId::RSA_SIGN, 1024, 384, 16384, SIGN_ALL, "RSA_SIGN", "RSA Signature"),
    row(AlgId::RSA_KEYX, 1024, 384, 16384, SIGN_ALL, "RSA_KEYX", "RSA Key Exchange"),
    row(AlgId::HMAC, 0, 0, 0, 0, "HMAC", HMAC_NAME),
    row(AlgId::PCT1_MASTER, 128, 128, 128, CRYPT_FLAG_PCT1, "PCT1 MASTER", "PCT1 Master"),
    row(AlgId::SSL2_MASTER, 40, 40, 192, CRYPT_FLAG_SSL2, "SSL2 MASTER", "SSL2 Master"),
    row(AlgId::SSL3_MASTER, 384, 384, 384, CRYPT_FLAG_SSL3, "SSL3 MASTER", "SSL3 Master"),
    row(AlgId::TLS1_MASTER, 384, 384, 384, CRYPT_FLAG_TLS1, "TLS1 MASTER", "TLS1 Master"),
    row(AlgId::SCHANNEL_MASTER_HASH, 0, 0, UNBOUNDED, 0, "SCH MASTER HASH", "SChannel Master Hash"),
    row(AlgId::SCHANNEL_MAC_KEY, 0, 0, UNBOUNDED, 0, "SCH MAC KEY", "SChannel MAC Key"),
    row(AlgId::SCHANNEL_ENC_KEY, 0, 0, UNBOUNDED, 0, "SCH ENC KEY", "SChannel Encryption Key"),
    row(AlgId::TLS1PRF, 0, 0, UNBOUNDED, 0, "TLS1 PRF", "TLS1 Pseudo Random Function"),
];

/// Provider names that select a personality.
pub mod provider_names {
    pub const MS_DEF_PROV: &str = "Microsoft Base Cryptographic Provider v1.0";
    pub const MS_ENHANCED_PROV: &str = "Microsoft Enhanced Cryptographic Provider v1.0";
    pub const MS_STRONG_PROV: &str = "Microsoft Strong Cryptographic Provider";
    pub const MS_DEF_RSA_SCHANNEL_PROV: &str = "Microsoft RSA SChannel Cryptographic Provider";
}

/// A capability profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Personality {
    Base,
    Strong,
    Enhanced,
    SChannel,
}

impl Personality {
    /// Select a personality from the provider name; unknown names get Strong.
    pub fn from_provider_name(name: Option<&str>) -> Personality {
        match name {
            Some(provider_names::MS_DEF_PROV) => Personality::Base,
            Some(provider_names::MS_ENHANCED_PROV) => Personality::Enhanced,
            Some(provider_names::MS_DEF_RSA_SCHANNEL_PROV) => Personality::SChannel,
            _ => Personality::Strong,
        }
    }

    pub fn provider_name(self) -> &'static str {
        match self {
            Personality::Base => provider_names::MS_DEF_PROV,
            Personality::Strong => provider_names::MS_STRONG_PROV,
            Personality::Enhanced => provider_names::MS_ENHANCED_PROV,
            Personality::SChannel => provider_names::MS_DEF_RSA_SCHANNEL_PROV,
        }
    }

    /// The full table, in enumeration order.
    pub fn algorithms(self) -> &'static [AlgorithmInfo] {
        match self {
            Personality::Base => &BASE_TABLE,
            Personality::Strong | Personality::Enhanced => &STRONG_TABLE,
            Personality::SChannel => &SCHANNEL_TABLE,
        }
    }

    pub fn lookup(self, alg: AlgId) -> Option<&'static AlgorithmInfo> {
        self.algorithms().iter().find(|info| info.alg == alg)
    }

    /// Like [`Personality::lookup`] but reports `BadAlgorithm`.
    pub fn require(self, alg: AlgId) -> CspResult<&'static AlgorithmInfo> {
        self.lookup(alg).ok_or(CspError::BadAlgorithm(alg.0))
    }
}

// =============================================================================
// ENUMERATION WIRE RECORDS
// =============================================================================

const SHORT_NAME_FIELD: usize = 20;
const LONG_NAME_FIELD: usize = 40;

/// Size of a short enumeration record.
pub const ENUMALGS_SIZE: usize = 4 + 4 + 4 + SHORT_NAME_FIELD;
/// Size of an extended enumeration record.
pub const ENUMALGS_EX_SIZE: usize = 4 * 6 + SHORT_NAME_FIELD + 4 + LONG_NAME_FIELD;

fn put_name(out: &mut Vec<u8>, name: &str, field: usize) {
    let bytes = name.as_bytes();
    let len = bytes.len().min(field - 1);
    out.extend_from_slice(&((len + 1) as u32).to_le_bytes());
    let start = out.len();
    out.extend_from_slice(&bytes[..len]);
    out.resize(start + field, 0);
}

impl AlgorithmInfo {
    /// `{algId, bitLen, nameLen, name[20]}`.
    pub fn encode_enum(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENUMALGS_SIZE);
        out.extend_from_slice(&self.alg.0.to_le_bytes());
        out.extend_from_slice(&self.default_bits.to_le_bytes());
        put_name(&mut out, self.name, SHORT_NAME_FIELD);
        out
    }

    /// `{algId, default, min, max, protocols, nameLen, name[20], longNameLen, longName[40]}`.
    pub fn encode_enum_ex(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENUMALGS_EX_SIZE);
        out.extend_from_slice(&self.alg.0.to_le_bytes());
        out.extend_from_slice(&self.default_bits.to_le_bytes());
        out.extend_from_slice(&self.min_bits.to_le_bytes());
        out.extend_from_slice(&self.max_bits.to_le_bytes());
        out.extend_from_slice(&self.protocols.to_le_bytes());
        put_name(&mut out, self.name, SHORT_NAME_FIELD);
        put_name(&mut out, self.long_name, LONG_NAME_FIELD);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_and_type_bits() {
        assert_eq!(AlgId::RC2.class(), ALG_CLASS_DATA_ENCRYPT);
        assert_eq!(AlgId::RC2.alg_type(), ALG_TYPE_BLOCK);
        assert_eq!(AlgId::RC4.alg_type(), ALG_TYPE_STREAM);
        assert_eq!(AlgId::RSA_KEYX.class(), ALG_CLASS_KEY_EXCHANGE);
        assert_eq!(AlgId::RSA_SIGN.class(), ALG_CLASS_SIGNATURE);
        assert_eq!(AlgId::TLS1_MASTER.class(), ALG_CLASS_MSG_ENCRYPT);
        assert_eq!(AlgId::TLS1_MASTER.alg_type(), ALG_TYPE_SECURECHANNEL);
        assert_eq!(AlgId::SHA.class(), ALG_CLASS_HASH);
    }

    #[test]
    fn test_personality_selection() {
        assert_eq!(
            Personality::from_provider_name(Some(provider_names::MS_DEF_PROV)),
            Personality::Base
        );
        assert_eq!(
            Personality::from_provider_name(Some(provider_names::MS_DEF_RSA_SCHANNEL_PROV)),
            Personality::SChannel
        );
        assert_eq!(Personality::from_provider_name(Some("anything")), Personality::Strong);
        assert_eq!(Personality::from_provider_name(None), Personality::Strong);
    }

    #[test]
    fn test_base_has_no_triple_des() {
        assert!(Personality::Base.lookup(AlgId::DES3).is_none());
        assert!(matches!(
            Personality::Base.require(AlgId::DES3_112),
            Err(CspError::BadAlgorithm(0x6609))
        ));
        assert!(Personality::Enhanced.lookup(AlgId::DES3).is_some());
    }

    #[test]
    fn test_schannel_drops_md2_md4() {
        assert!(Personality::SChannel.lookup(AlgId::MD2).is_none());
        assert!(Personality::SChannel.lookup(AlgId::MD4).is_none());
        assert!(Personality::SChannel.lookup(AlgId::TLS1PRF).is_some());
    }

    #[test]
    fn test_enum_ex_record_layout() {
        let info = Personality::Base.require(AlgId::RC2).unwrap();
        let record = info.encode_enum_ex();
        assert_eq!(record.len(), ENUMALGS_EX_SIZE);
        assert_eq!(&record[0..4], &0x6602u32.to_le_bytes());
        assert_eq!(&record[4..8], &40u32.to_le_bytes());
        assert_eq!(&record[8..12], &40u32.to_le_bytes());
        assert_eq!(&record[12..16], &56u32.to_le_bytes());
        assert_eq!(&record[20..24], &4u32.to_le_bytes());
        assert_eq!(&record[24..28], b"RC2\0");
        assert_eq!(&record[44..48], &24u32.to_le_bytes());
        assert_eq!(&record[48..71], b"RSA Data Security's RC2");
    }

    #[test]
    fn test_enum_record_layout() {
        let info = Personality::Strong.require(AlgId::SHA).unwrap();
        let record = info.encode_enum();
        assert_eq!(record.len(), ENUMALGS_SIZE);
        assert_eq!(&record[4..8], &160u32.to_le_bytes());
        assert_eq!(&record[8..12], &6u32.to_le_bytes());
        assert_eq!(&record[12..18], b"SHA-1\0");
    }
}
